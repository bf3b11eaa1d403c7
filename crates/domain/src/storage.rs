use crate::errors::StorageError;
use async_trait::async_trait;

/// アダプターが扱うレコード（中身は解釈しない JSON オブジェクト）
pub type Record = serde_json::Map<String, serde_json::Value>;

/// コレクション単位の CRUD を提供するストレージアダプター
///
/// 実装は「メモリ」「SQLite ファイル」「DynamoDB」の 3 種類で、意味論は共通:
/// - `insert` は ID の一意性を呼び出し側に委ね、渡されたレコードをそのまま返す
/// - `find_all` はライブビューではなく独立したコピーを返す（順序は実装依存）
/// - `find_by_id` / `update` は対象が無い場合 `None` を返し、エラーにはしない
/// - `update` は既存レコードへの浅いマージで、新規作成は行わない
/// - `remove` は物理削除し、削除できたかどうかを返す
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn insert(&self, collection: &str, item: Record) -> Result<Record, StorageError>;

    async fn find_all(&self, collection: &str) -> Result<Vec<Record>, StorageError>;

    async fn find_by_id(&self, collection: &str, id: &str)
        -> Result<Option<Record>, StorageError>;

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Record,
    ) -> Result<Option<Record>, StorageError>;

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StorageError>;
}

/// レコードの `id` フィールドを取得
pub fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(|v| v.as_str())
}

/// `fields` を `target` に浅くマージする
pub fn merge_fields(target: &mut Record, fields: Record) {
    for (key, value) in fields {
        target.insert(key, value);
    }
}
