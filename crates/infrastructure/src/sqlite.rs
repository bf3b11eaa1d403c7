use async_trait::async_trait;
use domain::{merge_fields, record_id, Record, StorageAdapter, StorageError};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// SQLite ファイルを使うストレージ
///
/// コレクションごとに `(id TEXT PRIMARY KEY, data TEXT)` のテーブルを持ち、
/// レコード全体を JSON 文字列として `data` 列に保存する。
#[derive(Clone)]
pub struct SqliteAdapter {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteAdapter {
    /// ファイルを開く（無ければ作成）。空文字ならメモリ上の DB を使う
    pub fn open(uri: &str) -> Result<Self, StorageError> {
        let conn = if uri.is_empty() || uri == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(uri))
        }
        .map_err(sqlite_error)?;

        debug!(uri, "SQLite を開きました");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// テーブルを用意してからブロッキングスレッドで `f` を実行
    async fn with_table<T, F>(&self, collection: &str, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> Result<T, StorageError> + Send + 'static,
    {
        let table = quoted_table(collection)?;
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StorageError::Backend("SQLite connection lock poisoned".to_string()))?;

            conn.execute(
                &format!("CREATE TABLE IF NOT EXISTS {table} (id TEXT PRIMARY KEY, data TEXT NOT NULL)"),
                [],
            )
            .map_err(sqlite_error)?;

            f(&mut *conn, &table)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("SQLite task failed: {e}")))?
    }
}

#[async_trait]
impl StorageAdapter for SqliteAdapter {
    async fn insert(&self, collection: &str, item: Record) -> Result<Record, StorageError> {
        let id = record_id(&item)
            .ok_or_else(|| StorageError::Serialization("record has no string id".to_string()))?
            .to_string();
        let data = serde_json::to_string(&item)?;

        self.with_table(collection, move |conn, table| {
            conn.execute(
                &format!("INSERT INTO {table} (id, data) VALUES (?1, ?2)"),
                params![id, data],
            )
            .map_err(sqlite_error)?;
            Ok(item)
        })
        .await
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Record>, StorageError> {
        self.with_table(collection, |conn, table| {
            let mut stmt = conn
                .prepare(&format!("SELECT data FROM {table} ORDER BY rowid"))
                .map_err(sqlite_error)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(sqlite_error)?;

            let mut records = Vec::new();
            for data in rows {
                let data = data.map_err(sqlite_error)?;
                records.push(serde_json::from_str(&data)?);
            }
            Ok(records)
        })
        .await
    }

    async fn find_by_id(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Record>, StorageError> {
        let id = id.to_string();
        self.with_table(collection, move |conn, table| {
            let data = select_data(conn, table, &id)?;
            data.map(|d| serde_json::from_str(&d).map_err(StorageError::from))
                .transpose()
        })
        .await
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: Record,
    ) -> Result<Option<Record>, StorageError> {
        let id = id.to_string();
        self.with_table(collection, move |conn, table| {
            let tx = conn.transaction().map_err(sqlite_error)?;

            let Some(data) = select_data(&tx, table, &id)? else {
                return Ok(None);
            };

            let mut record: Record = serde_json::from_str(&data)?;
            merge_fields(&mut record, fields);

            tx.execute(
                &format!("UPDATE {table} SET data = ?1 WHERE id = ?2"),
                params![serde_json::to_string(&record)?, id],
            )
            .map_err(sqlite_error)?;
            tx.commit().map_err(sqlite_error)?;

            Ok(Some(record))
        })
        .await
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let id = id.to_string();
        self.with_table(collection, move |conn, table| {
            let changed = conn
                .execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])
                .map_err(sqlite_error)?;
            Ok(changed > 0)
        })
        .await
    }
}

fn select_data(conn: &Connection, table: &str, id: &str) -> Result<Option<String>, StorageError> {
    conn.query_row(
        &format!("SELECT data FROM {table} WHERE id = ?1"),
        params![id],
        |row| row.get(0),
    )
    .optional()
    .map_err(sqlite_error)
}

/// コレクション名を検証し、SQL 用にクォートしたテーブル名を返す
fn quoted_table(collection: &str) -> Result<String, StorageError> {
    let mut chars = collection.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid {
        return Err(StorageError::InvalidCollection(collection.to_string()));
    }
    Ok(format!("\"{collection}\""))
}

fn sqlite_error(e: rusqlite::Error) -> StorageError {
    StorageError::Backend(e.to_string())
}
