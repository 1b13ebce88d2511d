// src/error.rs
// Standardized error types for reqconflict

use thiserror::Error;

/// Main error type for the reqconflict library
#[derive(Error, Debug)]
pub enum ConflictError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("missing required column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] calamine::Error),

    #[error("spreadsheet write error: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience type alias for Result using ConflictError
pub type Result<T> = std::result::Result<T, ConflictError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_error() {
        let err = ConflictError::MissingColumn {
            column: "Requirements".to_string(),
            path: "input.csv".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Requirements"));
        assert!(msg.contains("input.csv"));
    }


    #[test]
    fn test_config_error() {
        let err = ConflictError::Config("missing key".to_string());
        assert!(err.to_string().contains("configuration error"));
        assert!(err.to_string().contains("missing key"));
    }


    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ConflictError = io_err.into();
        assert!(matches!(err, ConflictError::Io(_)));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<i32>("not json").unwrap_err();
        let err: ConflictError = json_err.into();
        assert!(matches!(err, ConflictError::Json(_)));
    }
}
