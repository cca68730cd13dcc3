use crate::api::{Envelope, MediaType, UploadRequest};
use crate::status::{Outcome, Severity};

pub const STARTED_MESSAGE: &str = "Upload started, please wait… This can take a few minutes.";
const SUCCESS_FALLBACK: &str = "Upload finished.";
const FAILURE_FALLBACK: &str = "upload failed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
    #[default]
    MediaType,
    MediaUrl,
    Caption,
    Submit,
}

impl Field {
    pub fn title(self) -> &'static str {
        match self {
            Field::MediaType => "Media type",
            Field::MediaUrl => "Media URL",
            Field::Caption => "Caption",
            Field::Submit => "Upload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Submitting,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitBlocked {
    #[error("An upload is already in progress.")]
    InFlight,
    #[error("Media URL is required.")]
    MissingUrl,
}

/// The upload form: `Idle -> Submitting -> Idle`, with the outcome deciding
/// whether the fields are reset.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    media_type: MediaType,
    media_url: String,
    caption: String,
    focus: Field,
    phase: Phase,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn media_url(&self) -> &str {
        &self.media_url
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn focus(&self) -> Field {
        self.focus
    }

    pub fn is_submitting(&self) -> bool {
        self.phase == Phase::Submitting
    }

    /// The caption input is only offered for reels.
    pub fn caption_visible(&self) -> bool {
        self.media_type == MediaType::Reel
    }

    pub fn visible_fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::MediaType, Field::MediaUrl];
        if self.caption_visible() {
            fields.push(Field::Caption);
        }
        fields.push(Field::Submit);
        fields
    }

    pub fn focus_field(&mut self, field: Field) {
        if self.visible_fields().contains(&field) {
            self.focus = field;
        }
    }

    pub fn focus_next(&mut self) {
        self.shift_focus(1);
    }

    pub fn focus_previous(&mut self) {
        self.shift_focus(-1);
    }

    fn shift_focus(&mut self, delta: isize) {
        let fields = self.visible_fields();
        let len = fields.len() as isize;
        let current = fields.iter().position(|f| *f == self.focus).unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.focus = fields[next];
    }

    pub fn cycle_media_type(&mut self, delta: isize) {
        let all = MediaType::ALL;
        let len = all.len() as isize;
        let current = all
            .iter()
            .position(|kind| *kind == self.media_type)
            .unwrap_or(0) as isize;
        self.set_media_type(all[(current + delta).rem_euclid(len) as usize]);
    }

    pub fn set_media_type(&mut self, media_type: MediaType) {
        self.media_type = media_type;
        if self.focus == Field::Caption && !self.caption_visible() {
            self.focus = Field::MediaUrl;
        }
    }

    fn active_value_mut(&mut self) -> Option<&mut String> {
        match self.focus {
            Field::MediaUrl => Some(&mut self.media_url),
            Field::Caption => Some(&mut self.caption),
            Field::MediaType | Field::Submit => None,
        }
    }

    pub fn insert_char(&mut self, ch: char) {
        if let Some(value) = self.active_value_mut() {
            value.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(value) = self.active_value_mut() {
            value.pop();
        }
    }

    pub fn clear_active(&mut self) {
        if let Some(value) = self.active_value_mut() {
            value.clear();
        }
    }

    /// Enters `Submitting` and returns the body to send. The caption goes out
    /// even when the field is hidden.
    pub fn begin_submit(&mut self) -> Result<UploadRequest, SubmitBlocked> {
        if self.is_submitting() {
            return Err(SubmitBlocked::InFlight);
        }
        if self.media_url.trim().is_empty() {
            self.focus = Field::MediaUrl;
            return Err(SubmitBlocked::MissingUrl);
        }
        self.phase = Phase::Submitting;
        Ok(UploadRequest {
            media_type: self.media_type,
            media_url: self.media_url.clone(),
            caption: self.caption.clone(),
        })
    }

    pub fn finish(&mut self, result: &Envelope) -> Outcome {
        self.phase = Phase::Idle;
        if result.is_success() {
            self.reset();
            Outcome::new(result.message_or(SUCCESS_FALLBACK), Severity::Success)
        } else {
            Outcome::new(
                format!("Error: {}", result.message_or(FAILURE_FALLBACK)),
                Severity::Error,
            )
        }
    }

    fn reset(&mut self) {
        self.media_type = MediaType::default();
        self.media_url.clear();
        self.caption.clear();
        self.focus = Field::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_reel() -> UploadForm {
        let mut form = UploadForm::new();
        form.set_media_type(MediaType::Reel);
        form.focus_field(Field::MediaUrl);
        "https://cdn.example/clip.mp4"
            .chars()
            .for_each(|ch| form.insert_char(ch));
        form.focus_field(Field::Caption);
        "summer".chars().for_each(|ch| form.insert_char(ch));
        form
    }

    #[test]
    fn success_resets_fields_and_reenables() {
        let mut form = filled_reel();
        let request = form.begin_submit().unwrap();
        assert_eq!(request.media_type, MediaType::Reel);
        assert_eq!(request.caption, "summer");
        assert!(form.is_submitting());

        let outcome = form.finish(&Envelope::success("Reel published."));
        assert_eq!(outcome, Outcome::new("Reel published.", Severity::Success));
        assert!(!form.is_submitting());
        assert_eq!(form.media_url(), "");
        assert_eq!(form.caption(), "");
        assert_eq!(form.media_type(), MediaType::Image);
    }

    #[test]
    fn failure_preserves_fields_and_reenables() {
        let mut form = filled_reel();
        form.begin_submit().unwrap();
        let outcome = form.finish(&Envelope::error("container failed"));
        assert_eq!(outcome.severity, Severity::Error);
        assert_eq!(outcome.message, "Error: container failed");
        assert!(!form.is_submitting());
        assert_eq!(form.media_url(), "https://cdn.example/clip.mp4");
        assert_eq!(form.caption(), "summer");
        assert_eq!(form.media_type(), MediaType::Reel);
    }

    #[test]
    fn failure_without_message_uses_fallback() {
        let mut form = filled_reel();
        form.begin_submit().unwrap();
        let outcome = form.finish(&Envelope {
            status: crate::api::Status::Unknown,
            message: None,
            data: None,
        });
        assert_eq!(outcome.message, "Error: upload failed.");
    }

    #[test]
    fn missing_url_blocks_submission() {
        let mut form = UploadForm::new();
        assert_eq!(form.begin_submit(), Err(SubmitBlocked::MissingUrl));
        assert!(!form.is_submitting());
        assert_eq!(form.focus(), Field::MediaUrl);
    }

    #[test]
    fn second_submit_while_in_flight_is_refused() {
        let mut form = filled_reel();
        form.begin_submit().unwrap();
        assert_eq!(form.begin_submit(), Err(SubmitBlocked::InFlight));
    }

    #[test]
    fn hidden_caption_is_still_sent() {
        let mut form = filled_reel();
        form.set_media_type(MediaType::Image);
        assert!(!form.caption_visible());
        assert_eq!(form.focus(), Field::MediaUrl);
        let request = form.begin_submit().unwrap();
        assert_eq!(request.caption, "summer");
    }

    #[test]
    fn focus_skips_hidden_caption() {
        let mut form = UploadForm::new();
        form.focus_field(Field::MediaUrl);
        form.focus_next();
        assert_eq!(form.focus(), Field::Submit);
        form.focus_next();
        assert_eq!(form.focus(), Field::MediaType);
        form.focus_previous();
        assert_eq!(form.focus(), Field::Submit);

        form.cycle_media_type(-1);
        assert_eq!(form.media_type(), MediaType::Reel);
        form.focus_previous();
        assert_eq!(form.focus(), Field::Caption);
    }

    #[test]
    fn typing_on_selector_is_ignored() {
        let mut form = UploadForm::new();
        form.insert_char('x');
        assert_eq!(form.media_url(), "");
        assert_eq!(form.caption(), "");
    }
}
