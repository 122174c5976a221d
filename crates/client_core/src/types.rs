use shared::domain::SessionMode;

/// File extensions accepted as images when no content type is known.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

pub const DEFAULT_MAX_BATCH_FILES: usize = 100;
pub const DEFAULT_LOW_CONFIDENCE_THRESHOLD: usize = 5;
pub const DEFAULT_FONT_NAME: &str = "My Handwriting";

/// A locally held handwriting sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn is_image(&self) -> bool {
        match &self.content_type {
            Some(content_type) => content_type.to_ascii_lowercase().starts_with("image/"),
            None => self
                .extension()
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str())),
        }
    }

    /// Content type sent with the upload, guessed from the extension if absent.
    pub fn mime_type(&self) -> String {
        if let Some(content_type) = &self.content_type {
            return content_type.clone();
        }
        match self.extension().as_deref() {
            Some("png") => "image/png",
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            _ => "application/octet-stream",
        }
        .to_string()
    }

    /// The slot a file name maps to: its stem, if that is exactly one character.
    pub fn inferred_character(&self) -> Option<char> {
        character_from_file_name(&self.file_name)
    }
}

pub fn character_from_file_name(file_name: &str) -> Option<char> {
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };
    let mut chars = stem.chars();
    let first = chars.next()?;
    chars.next().is_none().then_some(first)
}

/// Lifecycle of one character slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Pending,
    Committed,
}

/// What the presentation layer should draw for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotVisual {
    Empty,
    Uploading,
    Uploaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UploadProgress {
    pub committed: usize,
    pub pending: usize,
    /// Slot count of the guided grid; `None` in freeform mode.
    pub total: Option<usize>,
}

impl UploadProgress {
    pub fn percent(&self) -> Option<u8> {
        let total = self.total.filter(|total| *total > 0)?;
        Some((self.committed.min(total) * 100 / total) as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SlotRendered { character: char, visual: SlotVisual },
    PreviewReady { character: char, file_name: String },
    ProgressUpdated(UploadProgress),
    Notified(Notification),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: SessionMode,
    pub max_batch_files: usize,
    pub low_confidence_threshold: usize,
    pub default_font_name: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: SessionMode::Guided,
            max_batch_files: DEFAULT_MAX_BATCH_FILES,
            low_confidence_threshold: DEFAULT_LOW_CONFIDENCE_THRESHOLD,
            default_font_name: DEFAULT_FONT_NAME.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn with_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Committed,
    /// A newer submission for the same slot, or a reset, made this response stale.
    Superseded,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Files whose name matched a slot and were dispatched for upload.
    pub matched: usize,
    pub committed: usize,
    pub rejected: Vec<char>,
    pub skipped: Vec<String>,
    pub non_image: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub message: String,
    pub font_path: String,
    pub font_name: String,
    pub low_confidence: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFont {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_must_be_exactly_one_character() {
        assert_eq!(character_from_file_name("A.png"), Some('A'));
        assert_eq!(character_from_file_name("b.jpg"), Some('b'));
        assert_eq!(character_from_file_name("!.png"), Some('!'));
        assert_eq!(character_from_file_name("5x.png"), None);
        assert_eq!(character_from_file_name(".png"), None);
        assert_eq!(character_from_file_name("Q"), Some('Q'));
        assert_eq!(character_from_file_name("é.png"), Some('é'));
    }

    #[test]
    fn image_detection_prefers_content_type() {
        assert!(ImageBlob::new("A.png", Vec::new()).is_image());
        assert!(ImageBlob::new("A.JPEG", Vec::new()).is_image());
        assert!(!ImageBlob::new("notes.txt", Vec::new()).is_image());
        assert!(!ImageBlob::new("A.png", Vec::new())
            .with_content_type("text/plain")
            .is_image());
        assert!(ImageBlob::new("scan", Vec::new())
            .with_content_type("image/webp")
            .is_image());
    }

    #[test]
    fn mime_type_is_guessed_from_extension() {
        assert_eq!(ImageBlob::new("a.JPG", Vec::new()).mime_type(), "image/jpeg");
        assert_eq!(
            ImageBlob::new("a", Vec::new()).mime_type(),
            "application/octet-stream"
        );
    }

    #[test]
    fn progress_percent_only_for_fixed_grid() {
        let guided = UploadProgress {
            committed: 18,
            pending: 1,
            total: Some(72),
        };
        assert_eq!(guided.percent(), Some(25));
        let freeform = UploadProgress {
            committed: 3,
            pending: 0,
            total: None,
        };
        assert_eq!(freeform.percent(), None);
    }
}
