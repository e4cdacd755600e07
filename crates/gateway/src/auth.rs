//! # APIキー認証
//!
//! `Authorization: Bearer <token>` を検証するミドルウェア。
//! ハンドラの前に実行し、失敗時はハンドラを呼ばずに応答する。
//! 成功時は検証済みの [`Credential`] をリクエストの extensions に格納する。

use std::sync::Arc;

use attest_crypto::{Credential, CredentialValidator};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::GatewayError;

/// ルートごとの認証設定。
#[derive(Debug, Clone)]
pub struct RequireScope {
    pub validator: Arc<CredentialValidator>,
    /// 必要なスコープ（空なら確認しない）
    pub scope: &'static str,
}

impl RequireScope {
    pub fn new(validator: Arc<CredentialValidator>, scope: &'static str) -> Self {
        Self { validator, scope }
    }
}

/// `Authorization` ヘッダーからBearerトークンを取り出す。
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, GatewayError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| GatewayError::Unauthenticated("Authorizationヘッダーがありません".into()))?
        .to_str()
        .map_err(|_| GatewayError::Unauthenticated("Authorizationヘッダーが不正です".into()))?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::Unauthenticated("Bearerトークンではありません".into()))?;
    Ok(token)
}

/// スコープ付きAPIキーを要求するミドルウェア。
///
/// `axum::middleware::from_fn_with_state(RequireScope, require_scope)` で使う。
pub async fn require_scope(
    State(guard): State<RequireScope>,
    mut req: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let credential: Credential = {
        let token = bearer_token(req.headers())?;
        guard.validator.validate(token, guard.scope)?
    };
    req.extensions_mut().insert(credential);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_token_rejects_other_forms() {
        assert!(bearer_token(&HeaderMap::new()).is_err());
        for value in ["abc.def.ghi", "Basic dXNlcjpwYXNz", "Bearer", "Bearer    ", "bearer abc"] {
            let err = bearer_token(&headers(value)).unwrap_err();
            assert!(matches!(err, GatewayError::Unauthenticated(_)), "{value}");
        }
    }
}
