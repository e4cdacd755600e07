//! # Attest Gateway
//!
//! TEEのAttestation Quoteを検証するHTTPゲートウェイ。
//!
//! ## 役割
//! - スコープ付きAPIキー（Ed25519署名JWT）による認証・認可
//! - Quote種別（SGX v3 / TDX v4）の判定と検証器への振り分け
//! - 検証結果の正規化
//!
//! ## API エンドポイント
//! - `POST /api/verify`: Quote検証（スコープ `verify`）
//! - `POST /api/issue`: APIキー発行（スコープ `admin`）

mod auth;
mod config;
mod endpoints;
mod error;
mod responder;

use std::sync::Arc;

use attest_types::{SCOPE_ADMIN, SCOPE_VERIFY};
use axum::middleware::from_fn_with_state;
use axum::routing::post;

use crate::auth::{require_scope, RequireScope};
use crate::config::{GatewayConfig, GatewayState};
use crate::endpoints::{handle_issue, handle_verify};

/// ルーターを構築する。
///
/// 認証は各ルートのPOSTにのみ適用する（他のメソッドは認証前に405）。
pub(crate) fn app(state: Arc<GatewayState>) -> axum::Router {
    let verify_guard = RequireScope::new(state.validator.clone(), SCOPE_VERIFY);
    let admin_guard = RequireScope::new(state.validator.clone(), SCOPE_ADMIN);

    axum::Router::new()
        .route(
            "/api/verify",
            post(handle_verify).route_layer(from_fn_with_state(verify_guard, require_scope)),
        )
        .route(
            "/api/issue",
            post(handle_issue).route_layer(from_fn_with_state(admin_guard, require_scope)),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// エントリポイント
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = GatewayConfig::from_env()?;
    let state = Arc::new(GatewayState::from_config(&config)?);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Gatewayを {} で起動します", config.listen_addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
