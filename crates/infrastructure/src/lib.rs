pub mod dynamodb;
pub mod memory;
pub mod models;
pub mod sqlite;

pub use dynamodb::*;
pub use memory::*;
pub use models::*;
pub use sqlite::*;

use domain::{StorageAdapter, StorageError};
use shared::{StorageBackend, StorageConfig};
use std::sync::Arc;
use tracing::info;

/// 設定に従ってストレージアダプターを生成
pub fn connect(config: &StorageConfig) -> Result<Arc<dyn StorageAdapter>, StorageError> {
    info!(backend = %config.backend, "ストレージを初期化します");

    let adapter: Arc<dyn StorageAdapter> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryAdapter::new()),
        StorageBackend::Sqlite => Arc::new(SqliteAdapter::open(&config.uri)?),
        StorageBackend::DynamoDb => Arc::new(DynamoDbAdapter::new(config)),
    };

    Ok(adapter)
}
