use thiserror::Error;

/// Failures talking to the remote model
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("No API key configured. Set GEMINI_API_KEY or api_key in config.toml")]
    MissingApiKey,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Model returned no text")]
    EmptyResponse,
}

/// Coarse category used to choose the user-facing fallback reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Unauthorized,
    Other,
}

impl LlmError {
    pub fn kind(&self) -> FailureKind {
        match self {
            LlmError::Api { status: 404, .. } => FailureKind::NotFound,
            LlmError::Api { status: 401 | 403, .. } => FailureKind::Unauthorized,
            LlmError::MissingApiKey => FailureKind::Unauthorized,
            // Some decode failures only surface the status in the message.
            // Transport errors are never text-matched: their text can carry
            // the key and model name.
            LlmError::Parse(text) if text.contains("404") => FailureKind::NotFound,
            LlmError::Parse(text) if text.contains("403") => FailureKind::Unauthorized,
            _ => FailureKind::Other,
        }
    }
}

/// Rejections raised when selecting a file to send
#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("file is {size} bytes, the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("unsupported media type {0}")]
    UnsupportedType(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let not_found = LlmError::Api { status: 404, message: "models/x is not found".into() };
        assert_eq!(not_found.kind(), FailureKind::NotFound);

        let forbidden = LlmError::Api { status: 403, message: "PERMISSION_DENIED".into() };
        assert_eq!(forbidden.kind(), FailureKind::Unauthorized);

        let unauthorized = LlmError::Api { status: 401, message: "UNAUTHENTICATED".into() };
        assert_eq!(unauthorized.kind(), FailureKind::Unauthorized);

        let overloaded = LlmError::Api { status: 503, message: "UNAVAILABLE".into() };
        assert_eq!(overloaded.kind(), FailureKind::Other);
    }

    #[test]
    fn test_message_classification() {
        assert_eq!(LlmError::Parse("status 404 returned".into()).kind(), FailureKind::NotFound);
        assert_eq!(LlmError::Parse("got 403".into()).kind(), FailureKind::Unauthorized);
        assert_eq!(LlmError::EmptyResponse.kind(), FailureKind::Other);
    }
}
