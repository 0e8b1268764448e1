use thiserror::Error;

/// Main error type for kgrag
#[derive(Error, Debug)]
pub enum KgragError {
    /// Graph store (SQLite) errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generative model call failed
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// A model or graph call exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Model output did not match the expected structured format
    #[error("Parse error: {0}")]
    Parse(String),

    /// No entities or no graph matches. Not fatal for a session.
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Coarse error classes the orchestration loop reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Io,
    EmptyResult,
    Other,
}

impl KgragError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            KgragError::Parse(_) => ErrorKind::Parse,
            KgragError::Database(_)
            | KgragError::Io(_)
            | KgragError::Llm(_)
            | KgragError::Embedding(_)
            | KgragError::Timeout(_) => ErrorKind::Io,
            KgragError::EmptyResult(_) => ErrorKind::EmptyResult,
            KgragError::Config(_) | KgragError::InvalidInput(_) => ErrorKind::Other,
        }
    }

    /// True for failures worth retrying at the orchestration layer (graph or
    /// model I/O). Of the SQLite errors only a busy or locked database counts;
    /// bad SQL or a violated constraint fails the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            KgragError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            KgragError::Database(_) => false,
            other => other.kind() == ErrorKind::Io,
        }
    }
}

/// Convenient Result type using KgragError
pub type Result<T> = std::result::Result<T, KgragError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KgragError::Config("Test error".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("Test error"));
    }

    #[test]
    fn test_error_from_rusqlite() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: KgragError = rusqlite_err.into();
        assert!(matches!(err, KgragError::Database(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!err.is_transient());
    }

    fn sqlite_failure(code: std::os::raw::c_int) -> KgragError {
        rusqlite::Error::SqliteFailure(rusqlite::ffi::Error::new(code), None).into()
    }

    #[test]
    fn test_only_busy_database_is_transient() {
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_BUSY).is_transient());
        assert!(sqlite_failure(rusqlite::ffi::SQLITE_LOCKED).is_transient());
        assert!(!sqlite_failure(rusqlite::ffi::SQLITE_CONSTRAINT).is_transient());
        assert!(!sqlite_failure(rusqlite::ffi::SQLITE_ERROR).is_transient());
        assert!(KgragError::Io(std::io::Error::other("down")).is_transient());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(KgragError::Parse("x".into()).kind(), ErrorKind::Parse);
        assert_eq!(KgragError::Timeout("x".into()).kind(), ErrorKind::Io);
        assert_eq!(KgragError::Llm("x".into()).kind(), ErrorKind::Io);
        assert_eq!(KgragError::EmptyResult("x".into()).kind(), ErrorKind::EmptyResult);
        assert!(!KgragError::Parse("x".into()).is_transient());
        assert!(!KgragError::InvalidInput("x".into()).is_transient());
    }
}
