use crate::errors::{DomainError, StorageError};
use crate::storage::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Todo を格納するコレクション名
pub const TODO_COLLECTION: &str = "Todo";

/// ToDo ID（ULID 文字列）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    /// 新しいToDo IDを生成
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// 文字列からToDo IDを作成
    pub fn from_string(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidTodoId(
                "Todo ID cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TodoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 完了状態
///
/// ワイヤ形式・保存形式ともに文字列 `"true"` / `"false"` で表現する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompletionStatus {
    #[serde(rename = "true")]
    Completed,
    #[default]
    #[serde(rename = "false")]
    Pending,
}

impl CompletionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionStatus::Completed => "true",
            CompletionStatus::Pending => "false",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, CompletionStatus::Completed)
    }
}

impl std::fmt::Display for CompletionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Todo 作成時の入力
#[derive(Debug, Clone, Default)]
pub struct NewTodo {
    /// 省略時は新規採番
    pub id: Option<TodoId>,
    pub description: String,
    /// 省略時は `"false"`
    pub is_completed: Option<CompletionStatus>,
}

impl NewTodo {
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }
}

/// Todo エンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: TodoId,
    pub description: String,
    pub is_completed: CompletionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// 新しい Todo を作成
    pub fn new(input: NewTodo) -> Result<Self, DomainError> {
        validate_description(&input.description)?;

        let now = Utc::now();
        Ok(Self {
            id: input.id.unwrap_or_default(),
            description: input.description,
            is_completed: input.is_completed.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        })
    }

    /// 指定されたフィールドのみ反映し、`updated_at` を更新する
    ///
    /// 完了状態の単方向遷移（false → true）はここでは検査しない。
    /// ストレージへの書き込みは必ずコマンド経由で行うこと。
    pub fn update(&mut self, changes: &TodoChanges) {
        if let Some(description) = &changes.description {
            self.description = description.clone();
        }
        if let Some(status) = changes.is_completed {
            self.is_completed = status;
        }
        self.updated_at = Utc::now();
    }

    /// 境界で公開する 3 フィールドの形に変換（タイムスタンプは含めない）
    pub fn to_record(&self) -> TodoRecord {
        TodoRecord {
            id: self.id.clone(),
            description: self.description.clone(),
            is_completed: self.is_completed,
        }
    }
}

/// Todo の部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoChanges {
    pub description: Option<String>,
    pub is_completed: Option<CompletionStatus>,
}

impl TodoChanges {
    /// 説明文の変更（空文字は不可）
    pub fn description(description: impl Into<String>) -> Result<Self, DomainError> {
        let description = description.into();
        validate_description(&description)?;
        Ok(Self {
            description: Some(description),
            is_completed: None,
        })
    }

    /// 完了状態の変更
    pub fn completion(status: CompletionStatus) -> Self {
        Self {
            description: None,
            is_completed: Some(status),
        }
    }

    /// アダプターの `update` に渡すマージ用レコード
    pub fn to_partial_record(&self) -> Record {
        let mut fields = Record::new();
        if let Some(description) = &self.description {
            fields.insert(
                "description".to_string(),
                serde_json::Value::String(description.clone()),
            );
        }
        if let Some(status) = self.is_completed {
            fields.insert(
                "isCompleted".to_string(),
                serde_json::Value::String(status.as_str().to_string()),
            );
        }
        fields
    }
}

/// 保存・API 応答で共通のシリアライズ形
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoRecord {
    pub id: TodoId,
    pub description: String,
    pub is_completed: CompletionStatus,
}

impl TodoRecord {
    pub fn to_storage(&self) -> Result<Record, StorageError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(StorageError::Serialization(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    pub fn from_storage(record: Record) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(serde_json::Value::Object(record))?)
    }
}

impl From<&Todo> for TodoRecord {
    fn from(todo: &Todo) -> Self {
        todo.to_record()
    }
}

fn validate_description(description: &str) -> Result<(), DomainError> {
    if description.is_empty() {
        return Err(DomainError::Validation(
            "Description is required".to_string(),
        ));
    }
    Ok(())
}
