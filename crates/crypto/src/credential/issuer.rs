//! # APIキー発行

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::Header;

use super::{Claims, Credential, CredentialError, ISSUER, PINNED_ALGORITHM};
use crate::keys::KeyMaterial;

/// 発行結果。署名済みトークンとその内容。
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    /// 署名済みJWT（compact形式）
    pub token: String,
    /// トークンに埋め込んだ内容
    pub credential: Credential,
}

/// スコープ付きAPIキーの発行者。
///
/// 鍵マテリアル以外の状態を持たない。同時に何本のリクエストから呼ばれてもよい。
#[derive(Debug, Clone)]
pub struct CredentialIssuer {
    keys: Arc<KeyMaterial>,
}

impl CredentialIssuer {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self { keys }
    }

    /// 現在時刻で発行する。
    pub fn issue(
        &self,
        subject: &str,
        scope: &str,
        validity: Duration,
    ) -> Result<IssuedCredential, CredentialError> {
        self.issue_at(subject, scope, validity, Utc::now())
    }

    /// 指定時刻を発行時刻として発行する。
    ///
    /// - `subject` は空白のみ不可。それ以外は加工せず `sub` に入れる
    /// - `validity` は正であること。上限は設けない
    /// - `exp` は秒単位に切り上げるため、常に `exp > iat`
    pub fn issue_at(
        &self,
        subject: &str,
        scope: &str,
        validity: Duration,
        now: DateTime<Utc>,
    ) -> Result<IssuedCredential, CredentialError> {
        if subject.trim().is_empty() {
            return Err(CredentialError::EmptySubject);
        }
        if validity.is_zero() {
            return Err(CredentialError::InvalidValidity("0秒".into()));
        }

        let iat = now.timestamp();
        let validity_secs = validity
            .as_secs()
            .saturating_add(u64::from(validity.subsec_nanos() > 0));
        let exp = i64::try_from(validity_secs)
            .ok()
            .and_then(|secs| iat.checked_add(secs))
            .ok_or_else(|| CredentialError::InvalidValidity(format!("{validity:?}")))?;

        let claims = Claims {
            iss: ISSUER.to_string(),
            sub: subject.to_string(),
            iat,
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
            scope: scope.to_string(),
        };

        let credential = Credential::from_claims(claims.clone())
            .map_err(|_| CredentialError::InvalidValidity(format!("{validity:?}")))?;

        let token = jsonwebtoken::encode(
            &Header::new(PINNED_ALGORITHM),
            &claims,
            self.keys.encoding_key(),
        )
        .map_err(|e| CredentialError::Signing(e.to_string()))?;

        tracing::debug!(
            subject = %credential.subject,
            scope = %credential.scope,
            jti = %credential.id,
            expires = %credential.expires_rfc3339(),
            "APIキーを発行しました"
        );

        Ok(IssuedCredential { token, credential })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;

    fn test_issuer() -> CredentialIssuer {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        CredentialIssuer::new(Arc::new(KeyMaterial::from_signing_key(&signing_key).unwrap()))
    }

    #[test]
    fn test_issue_sets_lifetime() {
        let issuer = test_issuer();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let issued = issuer
            .issue_at("acme", "verify", Duration::from_secs(86_400), now)
            .unwrap();

        assert_eq!(issued.credential.subject, "acme");
        assert_eq!(issued.credential.scope, "verify");
        assert_eq!(issued.credential.issued_at, now);
        assert_eq!(issued.credential.expires_at.timestamp(), 1_700_086_400);
        assert_eq!(issued.token.split('.').count(), 3);
    }

    /// 1秒未満の有効期間でも exp > iat になることを確認
    #[test]
    fn test_sub_second_validity_rounds_up() {
        let issuer = test_issuer();
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let issued = issuer
            .issue_at("acme", "verify", Duration::from_millis(10), now)
            .unwrap();
        assert!(issued.credential.expires_at > issued.credential.issued_at);
    }

    #[test]
    fn test_issue_rejects_bad_input() {
        let issuer = test_issuer();

        for subject in ["", "   ", "\t\n"] {
            assert!(matches!(
                issuer.issue(subject, "verify", Duration::from_secs(60)),
                Err(CredentialError::EmptySubject)
            ));
        }
        assert!(matches!(
            issuer.issue("acme", "verify", Duration::ZERO),
            Err(CredentialError::InvalidValidity(_))
        ));
        assert!(matches!(
            issuer.issue("acme", "verify", Duration::from_secs(u64::MAX)),
            Err(CredentialError::InvalidValidity(_))
        ));
    }

    /// subjectは前後の空白も含めてそのまま保持されることを確認
    #[test]
    fn test_subject_is_kept_verbatim() {
        let issuer = test_issuer();
        let issued = issuer.issue(" acme ", "verify", Duration::from_secs(60)).unwrap();
        assert_eq!(issued.credential.subject, " acme ");
    }

    /// 発行ごとにIDが異なることを確認
    #[test]
    fn test_ids_are_unique() {
        let issuer = test_issuer();
        let a = issuer.issue("acme", "verify", Duration::from_secs(60)).unwrap();
        let b = issuer.issue("acme", "verify", Duration::from_secs(60)).unwrap();
        assert_ne!(a.credential.id, b.credential.id);
    }
}
