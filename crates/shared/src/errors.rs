use serde::{Deserialize, Serialize};

/// API のエラーレスポンス本文 `{ "message": ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_value(ErrorResponse::new("id is required.")).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "id is required." }));
    }
}
