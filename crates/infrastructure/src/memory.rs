use async_trait::async_trait;
use domain::{merge_fields, record_id, Record, StorageAdapter, StorageError};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// プロセス内メモリのストレージ
///
/// コレクションは初回の書き込み時に作られ、再起動で消える。
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    collections: RwLock<HashMap<String, Vec<Record>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageAdapter for MemoryAdapter {
    async fn insert(&self, collection: &str, item: Record) -> Result<Record, StorageError> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .push(item.clone());
        Ok(item)
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Record>, StorageError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Record>, StorageError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|items| items.iter().find(|item| record_id(item) == Some(id)))
            .cloned())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Record,
    ) -> Result<Option<Record>, StorageError> {
        let mut collections = self.collections.write().await;
        let Some(item) = collections
            .get_mut(collection)
            .and_then(|items| items.iter_mut().find(|item| record_id(item) == Some(id)))
        else {
            return Ok(None);
        };

        merge_fields(item, fields);
        Ok(Some(item.clone()))
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let mut collections = self.collections.write().await;
        let Some(items) = collections.get_mut(collection) else {
            return Ok(false);
        };

        match items.iter().position(|item| record_id(item) == Some(id)) {
            Some(index) => {
                items.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let adapter = MemoryAdapter::new();
        adapter
            .insert("Todo", record(json!({"id": "1", "description": "a"})))
            .await
            .unwrap();

        assert_eq!(adapter.find_all("Todo").await.unwrap().len(), 1);
        assert!(adapter.find_all("Other").await.unwrap().is_empty());
        assert!(adapter.find_by_id("Other", "1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_all_returns_a_copy() {
        let adapter = MemoryAdapter::new();
        adapter
            .insert("Todo", record(json!({"id": "1", "description": "a"})))
            .await
            .unwrap();

        let mut snapshot = adapter.find_all("Todo").await.unwrap();
        snapshot.clear();

        assert_eq!(adapter.find_all("Todo").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_only_first_match() {
        let adapter = MemoryAdapter::new();
        adapter.insert("Todo", record(json!({"id": "1"}))).await.unwrap();
        adapter.insert("Todo", record(json!({"id": "2"}))).await.unwrap();

        assert!(adapter.remove("Todo", "1").await.unwrap());
        assert!(!adapter.remove("Todo", "1").await.unwrap());

        let remaining = adapter.find_all("Todo").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(record_id(&remaining[0]), Some("2"));
    }
}
