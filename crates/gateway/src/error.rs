//! # Gateway エラー型

use axum::http::StatusCode;
use axum::Json;
use tokenforge_types::ErrorResponse;

/// Gatewayエラー型。レスポンスは常に失敗形式のJSONで返す。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// リクエストボディを解釈できない
    #[error("{0}")]
    BadRequest(String),
    /// 発行者が未設定、または設定値が不正
    #[error("{0}")]
    NotConfigured(String),
    /// 発行ワークフローの失敗
    #[error("{}", .body.message)]
    Issuance {
        /// HTTPステータスコード
        status: u16,
        /// 失敗レスポンス
        body: ErrorResponse,
    },
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotConfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Issuance { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let body = match self {
            GatewayError::BadRequest(message) => {
                ErrorResponse::new("Invalid request body", message)
            }
            GatewayError::NotConfigured(message) => {
                ErrorResponse::new("Issuer not configured", message)
            }
            GatewayError::Issuance { body, .. } => body,
        };
        (status, Json(body)).into_response()
    }
}
