/// Core error types for the Pixelport host.
use std::path::PathBuf;

/// A specialized Result type for Pixelport operations.
pub type PortResult<T> = Result<T, PortError>;

/// Top-level error type encompassing all Pixelport subsystems.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("module instantiation failed: {0}")]
    Instantiation(String),

    #[error("missing export: `{name}`")]
    MissingExport { name: String },

    #[error("out of bounds: {offset}+{length} exceeds memory size {memory_size}")]
    OutOfBounds {
        offset: u64,
        length: u64,
        memory_size: usize,
    },

    #[error("unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("module trapped in `{entry}`: {message}")]
    ModuleTrap { entry: String, message: String },

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("config error: {message} ({path:?})")]
    Config { message: String, path: PathBuf },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PortError {
    /// Create a missing export error.
    pub fn missing_export(name: impl Into<String>) -> Self {
        PortError::MissingExport { name: name.into() }
    }

    /// Create a module trap error for the given entry point.
    pub fn trap(entry: impl Into<String>, message: impl std::fmt::Display) -> Self {
        PortError::ModuleTrap {
            entry: entry.into(),
            message: message.to_string(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        PortError::Config {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Whether the current frame can be dropped and the session continued.
    ///
    /// Only an out-of-bounds frame window qualifies; everything else is fatal
    /// at the point it is detected.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PortError::OutOfBounds { .. })
    }
}
