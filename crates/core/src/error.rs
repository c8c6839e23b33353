use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("knowledge engine error: {0}")]
    Engine(String),

    #[error("already processed: {0}")]
    AlreadyProcessed(String),

    #[error("store error: {0}")]
    Store(String),
}

impl CoreError {
    /// Chat-facing rendering. Retrieval and persistence failures collapse
    /// into one apologetic sentence; the detail stays in the logs. Every
    /// other kind keeps its specific, actionable message.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Engine(_) | CoreError::StorageUnavailable(_) | CoreError::Store(_) => {
                "I apologize, but I encountered an error while processing your question. \
                 Please try again."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(error: rusqlite::Error) -> Self {
        CoreError::Store(error.to_string())
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
