use domain::{StorageAdapter, TodoError, TodoRecord, TODO_COLLECTION};
use std::sync::Arc;
use tracing::debug;

/// Todo のリードモデル
#[derive(Clone)]
pub struct QueryHandler {
    store: Arc<dyn StorageAdapter>,
}

impl QueryHandler {
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self { store }
    }

    /// 全件取得（絞り込み・並び替え・ページングなし、順序はストア次第）
    pub async fn get_all_todos(&self) -> Result<Vec<TodoRecord>, TodoError> {
        let todos = self
            .store
            .find_all(TODO_COLLECTION)
            .await?
            .into_iter()
            .map(TodoRecord::from_storage)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = todos.len(), "ToDo一覧取得");
        Ok(todos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{CompletionStatus, Record, StorageError};
    use infrastructure::MemoryAdapter;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let handler = QueryHandler::new(Arc::new(MemoryAdapter::new()));
        assert!(handler.get_all_todos().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_returns_every_todo() {
        let store = Arc::new(MemoryAdapter::new());
        store
            .insert(
                TODO_COLLECTION,
                record(json!({"id": "1", "description": "a", "isCompleted": "false"})),
            )
            .await
            .unwrap();
        store
            .insert(
                TODO_COLLECTION,
                record(json!({"id": "2", "description": "b", "isCompleted": "true"})),
            )
            .await
            .unwrap();

        let handler = QueryHandler::new(store);
        let todos = handler.get_all_todos().await.unwrap();

        assert_eq!(todos.len(), 2);
        let completed = todos.iter().find(|t| t.id.as_str() == "2").unwrap();
        assert_eq!(completed.is_completed, CompletionStatus::Completed);
    }

    #[tokio::test]
    async fn test_malformed_record_is_an_error() {
        let store = Arc::new(MemoryAdapter::new());
        store
            .insert(TODO_COLLECTION, record(json!({"id": "1", "isCompleted": "maybe"})))
            .await
            .unwrap();

        let err = QueryHandler::new(store).get_all_todos().await.unwrap_err();
        assert!(matches!(err, TodoError::Storage(StorageError::Serialization(_))));
    }
}
