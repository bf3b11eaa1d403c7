//! Todo サービスの HTTP API（axum）
//!
//! すべての業務エンドポイントは `/api/v1` 配下にあり、
//! 成功時は 200、失敗時は `{ "message": ... }` を返す。

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use command_handler::CommandHandler;
use domain::{StorageAdapter, TodoError, TodoId, TodoRecord};
use query_handler::QueryHandler;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::ErrorResponse;
use std::sync::Arc;
use thiserror::Error;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, warn};

/// アプリケーションの共有状態
#[derive(Clone)]
pub struct AppState {
    commands: CommandHandler,
    queries: QueryHandler,
}

impl AppState {
    /// 同じストアをコマンドとリードモデルで共有する
    pub fn new(store: Arc<dyn StorageAdapter>) -> Self {
        Self {
            commands: CommandHandler::new(store.clone()),
            queries: QueryHandler::new(store),
        }
    }
}

/// ルータを構築して返します。
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/get-all-todos", get(get_all_todos))
        .route("/create-todo", post(create_todo))
        .route("/update-todo", post(update_todo))
        .route("/complete-todo", post(complete_todo))
        .route("/delete-todo", post(delete_todo));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// HTTP 境界のエラー
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn required(field: &str) -> Self {
        ApiError::BadRequest(format!("{field} is required."))
    }
}

/// NotFound は 404、それ以外はすべて 400
impl From<TodoError> for ApiError {
    fn from(e: TodoError) -> Self {
        if matches!(e, TodoError::Storage(_) | TodoError::Internal(_)) {
            error!(error = %e, "ToDo処理エラー");
        }

        if e.is_not_found() {
            ApiError::NotFound(e.to_string())
        } else {
            ApiError::BadRequest(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::BadRequest(format!("Invalid JSON: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        warn!(status = status.as_u16(), message = %self, "リクエスト失敗");
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// 書き込み系エンドポイントの共通リクエスト本文
///
/// 型の検査は行わず、必須項目の有無だけをハンドラで確認する。
#[derive(Debug, Default, Deserialize)]
struct TodoPayload {
    id: Option<Value>,
    description: Option<Value>,
}

impl TodoPayload {
    /// 空の本文は `{}` として扱う
    fn parse(body: &Bytes) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(body)?)
    }

    fn id(&mut self) -> Result<TodoId, ApiError> {
        let id = required_string(self.id.take(), "id")?;
        TodoId::from_string(id).map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    fn description(&mut self) -> Result<String, ApiError> {
        required_string(self.description.take(), "description")
    }
}

/// 欠落・null・空文字・文字列以外はすべて「未指定」
fn required_string(value: Option<Value>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        _ => Err(ApiError::required(field)),
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    /// サービスの簡易ステータス
    status: &'static str,
}

/// ヘルスチェック用ハンドラ
async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthBody { status: "ok" }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Resource not found".to_string())
}

/// GET /api/v1/get-all-todos
async fn get_all_todos(State(state): State<AppState>) -> Result<Json<Vec<TodoRecord>>, ApiError> {
    let todos = state.queries.get_all_todos().await?;
    Ok(Json(todos))
}

/// POST /api/v1/create-todo
async fn create_todo(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TodoRecord>, ApiError> {
    let description = TodoPayload::parse(&body)?.description()?;

    let created = state.commands.create_todo(&description).await?;
    Ok(Json(created))
}

/// POST /api/v1/update-todo
async fn update_todo(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TodoRecord>, ApiError> {
    let mut payload = TodoPayload::parse(&body)?;
    let id = payload.id()?;
    let description = payload.description()?;

    state
        .commands
        .update_todo(&id, &description)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Todo not found.".to_string()))
}

/// POST /api/v1/complete-todo
async fn complete_todo(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TodoRecord>, ApiError> {
    let id = TodoPayload::parse(&body)?.id()?;

    let completed = state.commands.complete_todo(&id).await?;
    Ok(Json(completed))
}

/// POST /api/v1/delete-todo
///
/// 存在しない場合も含め、失敗はすべて 400。
async fn delete_todo(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TodoRecord>, ApiError> {
    let id = TodoPayload::parse(&body)?.id()?;

    let deleted = state
        .commands
        .delete_todo(&id)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::NotFound(message) => ApiError::BadRequest(message),
            other => other,
        })?;
    Ok(Json(deleted))
}
