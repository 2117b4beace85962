use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    /// The handler returned an unrecoverable failure.
    #[error("Handler {handler} failed on hook {hook}: {reason}")]
    HandlerFailed {
        handler: String,
        hook: String,
        reason: String,
    },

    /// The process was invoked without a dispatch path to route on.
    #[error("Missing dispatch path ({0} is unset)")]
    MissingDispatchPath(String),
}

pub type Result<T> = std::result::Result<T, HookError>;
