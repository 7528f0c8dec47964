//! Error types for the CSV loader.

use thiserror::Error;

/// Error codes for log correlation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Trigger payload is absent or has no record list
    E001MalformedEvent,
    /// E002: Object key could not be decoded
    E002InvalidKey,
    /// E003: Object download failed
    E003FetchFailure,
    /// E004: Object is not valid header-delimited CSV
    E004CsvFailure,
    /// E005: Table write failed
    E005WriteFailure,
    /// E006: Scratch file could not be written or read
    E006ScratchIo,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001MalformedEvent => "E001",
            Self::E002InvalidKey => "E002",
            Self::E003FetchFailure => "E003",
            Self::E004CsvFailure => "E004",
            Self::E005WriteFailure => "E005",
            Self::E006ScratchIo => "E006",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while handling one trigger payload.
///
/// Only [`LoaderError::MalformedEvent`] is turned into a response; every
/// other variant fails the invocation and is left to the platform's retry
/// policy.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("[E001] Event is malformed: {0}")]
    MalformedEvent(String),

    #[error("[E002] Invalid object key '{key}': {message}")]
    InvalidKey { key: String, message: String },

    #[error("[E003] Failed to fetch s3://{bucket}/{key}: {message}")]
    Fetch {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("[E004] Failed to parse CSV: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("[E005] Failed to write to table '{table}': {message}")]
    Write { table: String, message: String },

    #[error("[E006] Scratch file error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoaderError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEvent(message.into())
    }

    pub fn fetch(bucket: &str, key: &str, message: impl std::fmt::Display) -> Self {
        Self::Fetch {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: message.to_string(),
        }
    }

    pub fn write(table: &str, message: impl std::fmt::Display) -> Self {
        Self::Write {
            table: table.to_string(),
            message: message.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedEvent(_) => ErrorCode::E001MalformedEvent,
            Self::InvalidKey { .. } => ErrorCode::E002InvalidKey,
            Self::Fetch { .. } => ErrorCode::E003FetchFailure,
            Self::Csv(_) => ErrorCode::E004CsvFailure,
            Self::Write { .. } => ErrorCode::E005WriteFailure,
            Self::Io(_) => ErrorCode::E006ScratchIo,
        }
    }

    pub fn is_malformed_event(&self) -> bool {
        matches!(self, Self::MalformedEvent(_))
    }
}

/// Result type alias for LoaderError
pub type Result<T> = std::result::Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_match_messages() {
        let err = LoaderError::malformed("Records missing");
        assert_eq!(err.code(), ErrorCode::E001MalformedEvent);
        assert!(err.to_string().starts_with("[E001]"));
        assert!(err.is_malformed_event());

        let err = LoaderError::fetch("bucket", "a.csv", "NoSuchKey");
        assert_eq!(err.code().as_str(), "E003");
        assert_eq!(
            err.to_string(),
            "[E003] Failed to fetch s3://bucket/a.csv: NoSuchKey"
        );
        assert!(!err.is_malformed_event());

        let err = LoaderError::write("people", "throttled");
        assert_eq!(err.code(), ErrorCode::E005WriteFailure);
        assert!(err.to_string().contains("'people'"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LoaderError = io.into();
        assert_eq!(err.code(), ErrorCode::E006ScratchIo);
    }
}
