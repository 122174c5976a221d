use serde::{Deserialize, Serialize};

/// Error body returned by the job backend on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }

    /// Extracts a non-empty `error` message from a raw response body, if any.
    pub fn message_from_body(body: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.error)
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_backend_message_from_json_body() {
        assert_eq!(
            ErrorBody::message_from_body(br#"{"error":"task folder missing"}"#),
            Some("task folder missing".to_string())
        );
    }

    #[test]
    fn ignores_blank_or_unparseable_bodies() {
        assert_eq!(ErrorBody::message_from_body(br#"{"error":"  "}"#), None);
        assert_eq!(ErrorBody::message_from_body(b"<html>502</html>"), None);
        assert_eq!(ErrorBody::message_from_body(b"{}"), None);
    }
}
