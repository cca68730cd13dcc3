use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

/// What a finished flow step wants shown on the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    pub severity: Severity,
}

impl Outcome {
    pub fn new<S: Into<String>>(message: S, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

/// Handed out when an operation starts; its completion may only touch the
/// status line while no newer operation has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

/// The single shared status line. Last write wins, except that completions
/// carrying an outdated [`Ticket`] are dropped.
#[derive(Debug, Clone)]
pub struct StatusLine {
    message: String,
    severity: Severity,
    latest: u64,
    pending: bool,
}

impl StatusLine {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Info,
            latest: 0,
            pending: false,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Whether the shown message belongs to an operation that has not
    /// completed yet.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn report<S: Into<String>>(&mut self, message: S, severity: Severity) {
        self.message = message.into();
        self.severity = severity;
        self.pending = false;
        tracing::debug!(severity = severity.as_str(), message = %self.message, "status");
    }

    pub fn begin<S: Into<String>>(&mut self, message: S, severity: Severity) -> Ticket {
        self.latest = self.latest.wrapping_add(1);
        self.report(message, severity);
        self.pending = true;
        Ticket(self.latest)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.latest
    }

    /// Returns whether the completion was shown.
    pub fn complete<S: Into<String>>(
        &mut self,
        ticket: Ticket,
        message: S,
        severity: Severity,
    ) -> bool {
        if !self.is_current(ticket) {
            tracing::debug!(
                ticket = ticket.0,
                latest = self.latest,
                "dropping stale status update"
            );
            return false;
        }
        self.report(message, severity);
        true
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_overwrites_previous_status() {
        let mut status = StatusLine::new("ready");
        status.report("working", Severity::Info);
        status.report("broken", Severity::Error);
        assert_eq!(status.message(), "broken");
        assert_eq!(status.severity(), Severity::Error);
    }

    #[test]
    fn stale_completion_is_dropped() {
        let mut status = StatusLine::default();
        let slow = status.begin("uploading", Severity::Info);
        let fast = status.begin("fetching posts", Severity::Info);

        assert!(status.complete(fast, "posts fetched", Severity::Success));
        assert!(!status.complete(slow, "upload failed", Severity::Error));
        assert_eq!(status.message(), "posts fetched");
        assert_eq!(status.severity(), Severity::Success);
    }

    #[test]
    fn pending_follows_the_current_ticket() {
        let mut status = StatusLine::default();
        assert!(!status.is_pending());
        let slow = status.begin("uploading", Severity::Info);
        assert!(status.is_pending());
        let fast = status.begin("fetching posts", Severity::Info);
        status.complete(fast, "posts fetched", Severity::Success);
        assert!(!status.is_pending());
        // The older operation is still running but no longer owns the line.
        status.complete(slow, "upload failed", Severity::Error);
        assert!(!status.is_pending());
        assert_eq!(status.message(), "posts fetched");
    }

    #[test]
    fn plain_report_does_not_invalidate_ticket() {
        let mut status = StatusLine::default();
        let ticket = status.begin("sending reply", Severity::Info);
        status.report("Reply text is required.", Severity::Error);
        assert!(status.complete(ticket, "sent", Severity::Success));
        assert_eq!(status.message(), "sent");
    }
}
