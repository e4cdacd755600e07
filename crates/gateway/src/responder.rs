//! # 検証結果の応答
//!
//! 検証結果（[`Verdict`]）とエラーを正規化された [`VerifyResponse`] に変換する。
//!
//! | 結果 | HTTP | 本文 |
//! |------|------|------|
//! | `Verified` | 200 | `success: true, status: "OK", message` |
//! | `Rejected` | 200 | `success: false, status: "VERIFICATION_FAILED", error` |
//! | `Malformed` / 不正なリクエスト | 400 | `success: false, error` |
//! | 内部エラー | 500 | `success: false, error` |
//!
//! `Rejected` はHTTPレベルの失敗ではない。リクエストは正しく処理され、答えが「否」だっただけ。

use attest_core::Verdict;
use attest_types::{VerifyResponse, STATUS_OK, STATUS_VERIFICATION_FAILED};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::GatewayError;

/// 検証結果を応答に変換する。`Malformed` はクライアントエラーとする。
pub fn respond(verdict: Verdict) -> Result<Json<VerifyResponse>, GatewayError> {
    match verdict {
        Verdict::Verified(message) => Ok(Json(VerifyResponse {
            success: true,
            status: Some(STATUS_OK.to_string()),
            message: Some(message),
            error: None,
        })),
        Verdict::Rejected(error) => Ok(Json(VerifyResponse {
            success: false,
            status: Some(STATUS_VERIFICATION_FAILED.to_string()),
            message: None,
            error: Some(error),
        })),
        Verdict::Malformed(error) => Err(GatewayError::BadRequest(error)),
    }
}

/// `{success: false, error}` の応答を構築する。
pub fn failure(status: StatusCode, error: &str) -> Response {
    (status, Json(VerifyResponse::failure(error))).into_response()
}
