//! # Gateway エラー型
//!
//! 全エンドポイントで共通のエラー型。応答本文は常に `{success: false, error}` の形。
//!
//! 認証失敗の応答は失敗理由によらず同じ文言にする（どの検証で落ちたかを漏らさない）。
//! 内部エラーの詳細はログにのみ出力する。

use attest_core::VerifierError;
use attest_crypto::{AuthFailure, CredentialError};
use axum::http::StatusCode;

use crate::responder;

/// 認証失敗時の応答文言。
pub const MSG_INVALID_API_KEY: &str = "Invalid API key";
/// 認可失敗時の応答文言。
pub const MSG_INSUFFICIENT_SCOPE: &str = "Insufficient scope";
/// 内部エラー時の応答文言。
pub const MSG_INTERNAL: &str = "Internal server error";
/// 外部検証ツールのタイムアウト時の応答文言。
pub const MSG_TIMEOUT: &str = "Quote verification timed out";

/// Gatewayエラー型。
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 不正なリクエスト（JSON・Base64・必須フィールド）、または解釈できないQuote
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),
    /// 認証失敗（ヘッダー欠落、不正トークン、署名不一致、期限切れ）
    #[error("認証に失敗: {0}")]
    Unauthenticated(String),
    /// 認可失敗（スコープ不足）
    #[error("スコープ不足: {0}")]
    Forbidden(String),
    /// 内部エラー（鍵マテリアル、一時ファイル、外部ツールの起動）
    #[error("内部エラー: {0}")]
    Internal(String),
    /// 外部検証ツールのタイムアウト
    #[error("検証がタイムアウトしました: {0}")]
    Timeout(String),
}

impl GatewayError {
    /// HTTPステータスコード。
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// クライアントに返す文言。
    pub fn client_message(&self) -> &str {
        match self {
            GatewayError::BadRequest(msg) => msg,
            GatewayError::Unauthenticated(_) => MSG_INVALID_API_KEY,
            GatewayError::Forbidden(_) => MSG_INSUFFICIENT_SCOPE,
            GatewayError::Internal(_) => MSG_INTERNAL,
            GatewayError::Timeout(_) => MSG_TIMEOUT,
        }
    }
}

impl From<CredentialError> for GatewayError {
    fn from(e: CredentialError) -> Self {
        match e.auth_failure() {
            AuthFailure::Forbidden => GatewayError::Forbidden(e.to_string()),
            AuthFailure::Unauthenticated => GatewayError::Unauthenticated(e.to_string()),
        }
    }
}

impl From<VerifierError> for GatewayError {
    fn from(e: VerifierError) -> Self {
        match e {
            VerifierError::Timeout(_) => GatewayError::Timeout(e.to_string()),
            VerifierError::Scratch(_) | VerifierError::Spawn(_) => {
                GatewayError::Internal(e.to_string())
            }
        }
    }
}

impl axum::response::IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            GatewayError::Internal(_) | GatewayError::Timeout(_) => {
                tracing::error!(error = %self, "リクエスト処理に失敗");
            }
            GatewayError::Unauthenticated(_) | GatewayError::Forbidden(_) => {
                tracing::warn!(error = %self, "リクエストを拒否");
            }
            GatewayError::BadRequest(_) => {
                tracing::debug!(error = %self, "不正なリクエスト");
            }
        }
        responder::failure(self.status(), self.client_message())
    }
}
