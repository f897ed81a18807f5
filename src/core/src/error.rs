use thiserror::Error;

/// Layerforge error types
#[derive(Error, Debug)]
pub enum BuildError {
    /// Blob storage directory could not be cleared or created
    #[error("Directory setup failed: {0}")]
    SetupError(String),

    /// External builder process failed to run or exited unsuccessfully
    #[error("Builder error: {0}")]
    BuilderError(String),

    /// External builder invocation failed for a layer
    #[error("Build layer {layer} failed: {message}")]
    InvocationError { layer: String, message: String },

    /// Build report missing or unreadable
    #[error("Build report unavailable: {path} - {message}")]
    ReportUnavailable { path: String, message: String },

    /// Build report could not be decoded
    #[error("Malformed build report: {path} - {message}")]
    ReportMalformed { path: String, message: String },

    /// Staged blob file could not be inspected
    #[error("Stat error: {0}")]
    StatError(String),

    /// Staged blob could not be moved to its content-addressed path
    #[error("Publish error: {0}")]
    PublishError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for BuildError {
    fn from(err: serde_json::Error) -> Self {
        BuildError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for BuildError {
    fn from(err: serde_yaml::Error) -> Self {
        BuildError::SerializationError(err.to_string())
    }
}

/// Result type alias for layerforge operations
pub type Result<T> = std::result::Result<T, BuildError>;
