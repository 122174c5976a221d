use thiserror::Error;

use crate::types::{Notification, Severity};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("could not start a font task: {0}")]
    TaskCreation(String),
    #[error("upload of '{character}' was rejected: {reason}")]
    UploadRejected { character: char, reason: String },
    #[error("font generation failed: {0}")]
    FontGeneration(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("font download failed: {0}")]
    Download(String),
}

impl SessionError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn notification(&self) -> Notification {
        Notification::new(Severity::Error, self.to_string())
    }
}
