use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardError>;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Drop target not found: {0}")]
    UnresolvedTarget(String),

    #[error("Dragged card {0} is no longer on the board")]
    StaleSource(String),

    #[error("Failed to persist move of card {card_id}: {reason}")]
    PersistenceFailure { card_id: String, reason: String },

    #[error("Board invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Card not found: {0}")]
    CardNotFound(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("No drag in progress")]
    NoActiveDrag,

    #[error("Card {0} is already being dragged")]
    DragInProgress(String),

    #[error("Card {0} was moved elsewhere while being dragged")]
    MovedDuringDrag(String),

    #[error("No async runtime to persist moves on: {0}")]
    NoRuntime(String),

    #[error("Drag event for card {got} does not match the dragged card {expected}")]
    ActiveMismatch { expected: String, got: String },

    #[error("Invalid priority: {0}")]
    InvalidPriority(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl BoardError {
    /// Whether the error should be shown to the user. Everything else is
    /// recovered locally by the drag session.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, Self::PersistenceFailure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_call() -> Result<()> {
        Err::<(), _>(anyhow::anyhow!("connection reset"))?;
        Ok(())
    }

    #[test]
    fn test_backend_errors_convert() {
        let err = backend_call().unwrap_err();
        assert!(matches!(err, BoardError::Backend(_)));
        assert_eq!(err.to_string(), "connection reset");
    }

    #[test]
    fn test_only_persistence_failures_are_user_visible() {
        let failure = BoardError::PersistenceFailure {
            card_id: "c1".to_string(),
            reason: "offline".to_string(),
        };
        assert!(failure.is_user_visible());
        assert!(!BoardError::UnresolvedTarget("x".to_string()).is_user_visible());
        assert!(!BoardError::InvariantViolation("dup".to_string()).is_user_visible());
    }
}
