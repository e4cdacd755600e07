//! # APIキー検証
//!
//! 検証順序:
//! 1. ヘッダーのデコード
//! 2. 署名アルゴリズムの固定（EdDSA以外は暗号検証の前に拒否）
//! 3. 署名・`iss`・必須クレームの検証
//! 4. 有効期限（`now < exp`）
//! 5. スコープ

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Validation;

use super::{scope_grants, Claims, Credential, CredentialError, ISSUER, PINNED_ALGORITHM};
use crate::keys::KeyMaterial;

/// スコープ付きAPIキーの検証者。
#[derive(Debug, Clone)]
pub struct CredentialValidator {
    keys: Arc<KeyMaterial>,
    validation: Validation,
}

impl CredentialValidator {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        let mut validation = Validation::new(PINNED_ALGORITHM);
        // 期限は validate_at で now < exp として判定する
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        Self { keys, validation }
    }

    /// 現在時刻で検証する。
    pub fn validate(
        &self,
        token: &str,
        required_scope: &str,
    ) -> Result<Credential, CredentialError> {
        self.validate_at(token, required_scope, Utc::now())
    }

    /// 指定時刻で検証する。
    ///
    /// `required_scope` が空の場合はスコープを確認しない。
    /// 成功時は保持者・スコープ・有効期限を監査ログに出力する。
    pub fn validate_at(
        &self,
        token: &str,
        required_scope: &str,
        now: DateTime<Utc>,
    ) -> Result<Credential, CredentialError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| CredentialError::Malformed(e.to_string()))?;
        if header.alg != PINNED_ALGORITHM {
            return Err(CredentialError::AlgorithmMismatch(format!("{:?}", header.alg)));
        }

        let data = jsonwebtoken::decode::<Claims>(token, self.keys.decoding_key(), &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => CredentialError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => {
                    CredentialError::AlgorithmMismatch(format!("{:?}", header.alg))
                }
                _ => CredentialError::Malformed(e.to_string()),
            })?;

        let credential = Credential::from_claims(data.claims)?;

        if now >= credential.expires_at {
            return Err(CredentialError::Expired(credential.expires_rfc3339()));
        }

        if !scope_grants(&credential.scope, required_scope) {
            return Err(CredentialError::InsufficientScope(required_scope.to_string()));
        }

        tracing::info!(
            subject = %credential.subject,
            scope = %credential.scope,
            expires = %credential.expires_rfc3339(),
            "認証済みリクエスト"
        );

        Ok(credential)
    }
}
