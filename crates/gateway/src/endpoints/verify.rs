//! # POST /api/verify
//!
//! Base64エンコードされたQuoteを受け取り、種別を判定して検証する。

use std::sync::Arc;

use attest_crypto::Credential;
use attest_types::{VerifyRequest, VerifyResponse};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Extension, Json};
use base64::Engine;

use crate::config::GatewayState;
use crate::error::GatewayError;
use crate::responder;

/// Base64エンジン（Standard）
fn b64() -> base64::engine::GeneralPurpose {
    base64::engine::general_purpose::STANDARD
}

/// POST /api/verify: Quote検証。
///
/// 検証失敗（`Rejected`）は200で `success: false` を返す。
/// 解釈できないQuoteは400。
pub async fn handle_verify(
    State(state): State<Arc<GatewayState>>,
    Extension(credential): Extension<Credential>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, GatewayError> {
    let request = super::json_body(body)?;
    if request.quote.is_empty() {
        return Err(GatewayError::BadRequest("Missing 'quote' field".to_string()));
    }

    let raw = b64()
        .decode(request.quote.trim())
        .map_err(|_| GatewayError::BadRequest("Invalid base64 in 'quote' field".to_string()))?;

    let (family, verdict) = state.router.route(&raw).await?;

    tracing::info!(
        subject = %credential.subject,
        family = %family,
        bytes = raw.len(),
        verdict = verdict.kind(),
        "Quote検証リクエストを処理"
    );

    responder::respond(verdict)
}
