use thiserror::Error;

/// エンティティ・値オブジェクトの不変条件違反
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid TodoId: {0}")]
    InvalidTodoId(String),
}

/// ストレージアダプターのエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Record serialization error: {0}")]
    Serialization(String),

    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// コマンド・リードモデルの失敗
///
/// `Display` の文字列はそのまま API の `message` として返される。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TodoError {
    #[error("{0}")]
    Validation(String),

    #[error("Todo not found.")]
    NotFound(String),

    #[error("Todo is already completed.")]
    AlreadyCompleted(String),

    #[error("{0}")]
    Internal(String),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Domain(#[from] DomainError),
}

impl TodoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TodoError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_messages() {
        assert_eq!(
            TodoError::NotFound("01H".to_string()).to_string(),
            "Todo not found."
        );
        assert_eq!(
            TodoError::AlreadyCompleted("01H".to_string()).to_string(),
            "Todo is already completed."
        );
        assert_eq!(
            TodoError::Internal("Failed to delete Todo.".to_string()).to_string(),
            "Failed to delete Todo."
        );
    }

    #[test]
    fn test_domain_error_passes_message_through() {
        let err: TodoError = DomainError::Validation("Description is required".to_string()).into();
        assert_eq!(err.to_string(), "Description is required");
        assert!(!err.is_not_found());
    }
}
