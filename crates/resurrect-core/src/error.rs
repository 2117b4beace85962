use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResurrectError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// `stop` was called with no pid argument and nothing stored.
    #[error("Resurrect is not started")]
    NotStarted,

    #[error("Missing environment variable: {var}")]
    MissingEnv { var: String },

    #[error("Spawn failed: {0}")]
    Spawn(String),

    /// Signal delivery failed. The stored pid has already been cleared.
    #[error("Failed to signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("State error: {0}")]
    State(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResurrectError {
    /// Short, stable error code for log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            ResurrectError::Config(_) => "CONFIG_ERROR",
            ResurrectError::NotStarted => "NOT_STARTED",
            ResurrectError::MissingEnv { .. } => "MISSING_ENV",
            ResurrectError::Spawn(_) => "SPAWN_FAILED",
            ResurrectError::Signal { .. } => "SIGNAL_FAILED",
            ResurrectError::State(_) => "STATE_ERROR",
            ResurrectError::Serialization(_) => "SERIALIZATION_ERROR",
            ResurrectError::Io(_) => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ResurrectError>;
