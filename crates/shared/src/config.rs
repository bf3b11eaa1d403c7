use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// 設定読み込みエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Unknown storage backend: {0} (expected memory, sqlite or dynamodb)")]
    UnknownBackend(String),

    #[error("Invalid {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// ストレージバックエンドの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Memory,
    Sqlite,
    DynamoDb,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Sqlite => "sqlite",
            StorageBackend::DynamoDb => "dynamodb",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "memory" => Ok(StorageBackend::Memory),
            "sqlite" => Ok(StorageBackend::Sqlite),
            "dynamodb" => Ok(StorageBackend::DynamoDb),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// ストレージ関連の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// SQLite のファイルパス（空ならプロセス内のメモリ DB）
    pub uri: String,
    pub dynamodb_table: String,
    /// DynamoDB Local などへの接続先上書き
    pub dynamodb_endpoint: Option<String>,
    pub aws_region: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            uri: String::new(),
            dynamodb_table: "todo-app".to_string(),
            dynamodb_endpoint: None,
            aws_region: "ap-northeast-1".to_string(),
        }
    }
}

/// アプリケーション設定（起動時に一度だけ読み込む）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub json_logs: bool,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            json_logs: false,
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// `.env` と環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(&env::vars().collect())
    }

    /// 変数マップから設定を組み立てる
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let get = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();

        let port = match get("PORT") {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value,
            })?,
            None => defaults.port,
        };

        let backend = match get("DB_TYPE") {
            Some(value) => value.parse()?,
            None => StorageBackend::default(),
        };

        Ok(Config {
            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
            host: get("HOST").unwrap_or(defaults.host),
            port,
            json_logs: get("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            storage: StorageConfig {
                backend,
                uri: get("DB_URI").unwrap_or(defaults.storage.uri),
                dynamodb_table: get("DYNAMODB_TABLE").unwrap_or(defaults.storage.dynamodb_table),
                dynamodb_endpoint: get("DYNAMODB_ENDPOINT"),
                aws_region: get("AWS_REGION").unwrap_or(defaults.storage.aws_region),
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
