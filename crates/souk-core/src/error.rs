use thiserror::Error;

/// Top-level error type for the Souk system.
///
/// Each variant wraps a subsystem-specific message. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for SoukError`
/// so that the `?` operator works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SoukError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for SoukError {
    fn from(err: toml::de::Error) -> Self {
        SoukError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SoukError {
    fn from(err: toml::ser::Error) -> Self {
        SoukError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SoukError {
    fn from(err: serde_json::Error) -> Self {
        SoukError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Souk operations.
pub type Result<T> = std::result::Result<T, SoukError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SoukError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = SoukError::Embedding("model not loaded".to_string());
        assert_eq!(err.to_string(), "Embedding error: model not loaded");

        let err = SoukError::Index("dimension mismatch".to_string());
        assert_eq!(err.to_string(), "Index error: dimension mismatch");

        let err = SoukError::Catalog("unknown dataset".to_string());
        assert_eq!(err.to_string(), "Catalog error: unknown dataset");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let souk_err: SoukError = io_err.into();
        assert!(matches!(souk_err, SoukError::Io(_)));
        assert!(souk_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let bad_toml = "invalid = [[[";
        let err: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        assert!(err.is_err());
        let souk_err: SoukError = err.unwrap_err().into();
        assert!(matches!(souk_err, SoukError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let bad_json = "{ invalid json }";
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        assert!(err.is_err());
        let souk_err: SoukError = err.unwrap_err().into();
        assert!(matches!(souk_err, SoukError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }

    #[test]
    fn test_error_debug_impl() {
        let err = SoukError::Storage("disk full".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("Storage"));
        assert!(debug_str.contains("disk full"));
    }
}
