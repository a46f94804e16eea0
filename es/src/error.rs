//! Store error types

use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// Check if this is a missing-row error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = StoreError::NotFound { entity: "event", id: 42 };
        assert_eq!(err.to_string(), "event 42 not found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_data_is_not_not_found() {
        let err = StoreError::InvalidData("bad timestamp".to_string());
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("bad timestamp"));
    }
}
