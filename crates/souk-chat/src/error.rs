//! Error types for the conversational agent.

use souk_core::error::SoukError;
use uuid::Uuid;

/// Errors surfaced by the orchestrator to its caller.
///
/// Tool-level failures never appear here: the dispatcher converts every
/// one of them into a structured record the model (and the user) can see.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("conversation not found: {0}")]
    ConversationNotFound(Uuid),
    #[error("conversation {0} is referenced by an inquiry and cannot be purged")]
    ConversationReferenced(Uuid),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<SoukError> for ChatError {
    fn from(err: SoukError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(4000).to_string(),
            "message exceeds maximum length of 4000 characters"
        );

        let id = Uuid::nil();
        assert!(ChatError::ConversationNotFound(id)
            .to_string()
            .contains("00000000"));
        assert!(ChatError::ConversationReferenced(id)
            .to_string()
            .contains("cannot be purged"));
    }

    #[test]
    fn test_from_souk_error() {
        let err: ChatError = SoukError::Storage("disk full".to_string()).into();
        assert!(matches!(err, ChatError::Storage(_)));
        assert!(err.to_string().contains("disk full"));
    }
}
