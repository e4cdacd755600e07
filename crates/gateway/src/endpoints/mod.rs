//! # Gatewayエンドポイント
//!
//! - `POST /api/verify`: Quote検証（スコープ `verify`）
//! - `POST /api/issue`: APIキー発行（スコープ `admin`）

pub mod issue;
pub mod verify;

pub use issue::handle_issue;
pub use verify::handle_verify;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::GatewayError;

/// JSONボディの取り出し。パース失敗は一律 "Invalid JSON body" とする。
pub(crate) fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, GatewayError> {
    body.map(|Json(v)| v).map_err(|e| {
        tracing::debug!(error = %e, "リクエストボディのパースに失敗");
        GatewayError::BadRequest("Invalid JSON body".to_string())
    })
}
