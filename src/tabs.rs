use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    #[default]
    Upload,
    Comments,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Upload, Tab::Comments];

    pub fn title(self) -> &'static str {
        match self {
            Tab::Upload => "Upload",
            Tab::Comments => "Comments",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Tab::Upload => 0,
            Tab::Comments => 1,
        }
    }

    pub fn parse(raw: &str) -> Option<Tab> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "upload" => Some(Tab::Upload),
            "comments" => Some(Tab::Comments),
            _ => None,
        }
    }
}

/// Exactly one tab is active at any time. Switching is a visibility toggle
/// only; nothing is reloaded.
#[derive(Debug, Clone, Copy)]
pub struct TabController {
    active: Tab,
}

impl TabController {
    pub fn new(initial: Tab) -> Self {
        Self { active: initial }
    }

    pub fn active(&self) -> Tab {
        self.active
    }

    pub fn is_active(&self, tab: Tab) -> bool {
        self.active == tab
    }

    /// Returns whether the active tab changed.
    pub fn select(&mut self, tab: Tab) -> bool {
        let changed = self.active != tab;
        self.active = tab;
        changed
    }

    pub fn next(&mut self) -> Tab {
        let idx = (self.active.index() + 1) % Tab::ALL.len();
        self.active = Tab::ALL[idx];
        self.active
    }

    pub fn previous(&mut self) -> Tab {
        let len = Tab::ALL.len();
        let idx = (self.active.index() + len - 1) % len;
        self.active = Tab::ALL[idx];
        self.active
    }
}

impl Default for TabController {
    fn default() -> Self {
        Self::new(Tab::default())
    }
}
