use domain::{
    CompletionStatus, NewTodo, StorageAdapter, Todo, TodoChanges, TodoError, TodoId, TodoRecord,
    TODO_COLLECTION,
};
use std::sync::Arc;
use tracing::{error, info};

/// Todo への書き込みコマンド
///
/// 各メソッドは 1 回で完結し、呼び出し間で状態を持たない。
#[derive(Clone)]
pub struct CommandHandler {
    store: Arc<dyn StorageAdapter>,
}

impl CommandHandler {
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self { store }
    }

    /// ToDo作成
    pub async fn create_todo(&self, description: &str) -> Result<TodoRecord, TodoError> {
        let todo = Todo::new(NewTodo::with_description(description))?;
        let record = todo.to_record();

        self.store
            .insert(TODO_COLLECTION, record.to_storage()?)
            .await?;

        info!(todo_id = %record.id, "ToDo作成完了");
        Ok(record)
    }

    /// ToDo更新（説明文のみ）
    ///
    /// 対象が存在しない場合は `Ok(None)`。
    pub async fn update_todo(
        &self,
        id: &TodoId,
        description: &str,
    ) -> Result<Option<TodoRecord>, TodoError> {
        let changes = TodoChanges::description(description)?;

        let updated = self
            .store
            .update(TODO_COLLECTION, id.as_str(), changes.to_partial_record())
            .await?
            .map(TodoRecord::from_storage)
            .transpose()?;

        if updated.is_some() {
            info!(todo_id = %id, "ToDo更新完了");
        }
        Ok(updated)
    }

    /// ToDo完了（false → true の一方向のみ）
    pub async fn complete_todo(&self, id: &TodoId) -> Result<TodoRecord, TodoError> {
        let current = self.find(id).await?;
        if current.is_completed.is_completed() {
            return Err(TodoError::AlreadyCompleted(id.to_string()));
        }

        let changes = TodoChanges::completion(CompletionStatus::Completed);
        let completed = self
            .store
            .update(TODO_COLLECTION, id.as_str(), changes.to_partial_record())
            .await?
            .map(TodoRecord::from_storage)
            .transpose()?
            .ok_or_else(|| TodoError::NotFound(id.to_string()))?;

        info!(todo_id = %id, "ToDo完了");
        Ok(completed)
    }

    /// ToDo削除（削除前のスナップショットを返す）
    pub async fn delete_todo(&self, id: &TodoId) -> Result<TodoRecord, TodoError> {
        let snapshot = self.find(id).await?;

        if !self.store.remove(TODO_COLLECTION, id.as_str()).await? {
            error!(todo_id = %id, "取得できた ToDo を削除できませんでした");
            return Err(TodoError::Internal("Failed to delete Todo.".to_string()));
        }

        info!(todo_id = %id, "ToDo削除完了");
        Ok(snapshot)
    }

    async fn find(&self, id: &TodoId) -> Result<TodoRecord, TodoError> {
        let record = self
            .store
            .find_by_id(TODO_COLLECTION, id.as_str())
            .await?
            .ok_or_else(|| TodoError::NotFound(id.to_string()))?;

        Ok(TodoRecord::from_storage(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use domain::{Record, StorageError};
    use infrastructure::MemoryAdapter;

    fn handler() -> (CommandHandler, Arc<MemoryAdapter>) {
        let store = Arc::new(MemoryAdapter::new());
        (CommandHandler::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_create_todo() {
        let (handler, store) = handler();

        let created = handler.create_todo("Test todo description").await.unwrap();
        assert_eq!(created.description, "Test todo description");
        assert_eq!(created.is_completed, CompletionStatus::Pending);

        let stored = store
            .find_by_id(TODO_COLLECTION, created.id.as_str())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(TodoRecord::from_storage(stored).unwrap(), created);
    }

    #[tokio::test]
    async fn test_create_todo_generates_unique_ids() {
        let (handler, _) = handler();

        let first = handler.create_todo("a").await.unwrap();
        let second = handler.create_todo("b").await.unwrap();
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_create_todo_rejects_empty_description() {
        let (handler, store) = handler();

        let err = handler.create_todo("").await.unwrap_err();
        assert_eq!(err.to_string(), "Description is required");
        assert!(store.find_all(TODO_COLLECTION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_todo_keeps_completion() {
        let (handler, _) = handler();
        let created = handler.create_todo("before").await.unwrap();
        handler.complete_todo(&created.id).await.unwrap();

        let updated = handler
            .update_todo(&created.id, "after")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.description, "after");
        assert_eq!(updated.is_completed, CompletionStatus::Completed);
    }

    #[tokio::test]
    async fn test_update_missing_todo_returns_none() {
        let (handler, store) = handler();

        let result = handler.update_todo(&TodoId::new(), "anything").await.unwrap();
        assert!(result.is_none());
        assert!(store.find_all(TODO_COLLECTION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_todo_once() {
        let (handler, _) = handler();
        let created = handler.create_todo("finish me").await.unwrap();

        let completed = handler.complete_todo(&created.id).await.unwrap();
        assert_eq!(completed.description, "finish me");
        assert_eq!(completed.is_completed, CompletionStatus::Completed);

        let err = handler.complete_todo(&created.id).await.unwrap_err();
        assert_eq!(err, TodoError::AlreadyCompleted(created.id.to_string()));
        assert_eq!(err.to_string(), "Todo is already completed.");
    }

    #[tokio::test]
    async fn test_complete_missing_todo() {
        let (handler, _) = handler();

        let err = handler.complete_todo(&TodoId::new()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Todo not found.");
    }

    #[tokio::test]
    async fn test_delete_todo_returns_snapshot() {
        let (handler, store) = handler();
        let created = handler.create_todo("remove me").await.unwrap();

        let deleted = handler.delete_todo(&created.id).await.unwrap();
        assert_eq!(deleted, created);
        assert!(store
            .find_by_id(TODO_COLLECTION, created.id.as_str())
            .await
            .unwrap()
            .is_none());

        let err = handler.delete_todo(&created.id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    /// 検索は成功するが削除が常に失敗するストア
    struct StubbornStore(MemoryAdapter);

    #[async_trait]
    impl StorageAdapter for StubbornStore {
        async fn insert(&self, collection: &str, item: Record) -> Result<Record, StorageError> {
            self.0.insert(collection, item).await
        }

        async fn find_all(&self, collection: &str) -> Result<Vec<Record>, StorageError> {
            self.0.find_all(collection).await
        }

        async fn find_by_id(
            &self,
            collection: &str,
            id: &str,
        ) -> Result<Option<Record>, StorageError> {
            self.0.find_by_id(collection, id).await
        }

        async fn update(
            &self,
            collection: &str,
            id: &str,
            fields: Record,
        ) -> Result<Option<Record>, StorageError> {
            self.0.update(collection, id, fields).await
        }

        async fn remove(&self, _collection: &str, _id: &str) -> Result<bool, StorageError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_delete_reports_internal_error_when_remove_fails() {
        let handler = CommandHandler::new(Arc::new(StubbornStore(MemoryAdapter::new())));
        let created = handler.create_todo("stuck").await.unwrap();

        let err = handler.delete_todo(&created.id).await.unwrap_err();
        assert_eq!(err, TodoError::Internal("Failed to delete Todo.".to_string()));
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        struct BrokenStore;

        #[async_trait]
        impl StorageAdapter for BrokenStore {
            async fn insert(&self, _: &str, _: Record) -> Result<Record, StorageError> {
                Err(StorageError::Backend("disk full".to_string()))
            }
            async fn find_all(&self, _: &str) -> Result<Vec<Record>, StorageError> {
                Err(StorageError::Backend("disk full".to_string()))
            }
            async fn find_by_id(&self, _: &str, _: &str) -> Result<Option<Record>, StorageError> {
                Err(StorageError::Backend("disk full".to_string()))
            }
            async fn update(
                &self,
                _: &str,
                _: &str,
                _: Record,
            ) -> Result<Option<Record>, StorageError> {
                Err(StorageError::Backend("disk full".to_string()))
            }
            async fn remove(&self, _: &str, _: &str) -> Result<bool, StorageError> {
                Err(StorageError::Backend("disk full".to_string()))
            }
        }

        let handler = CommandHandler::new(Arc::new(BrokenStore));
        let err = handler.create_todo("x").await.unwrap_err();
        assert!(matches!(err, TodoError::Storage(StorageError::Backend(_))));
    }
}
