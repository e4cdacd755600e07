//! # スコープ付きAPIキー
//!
//! Ed25519署名のJWTとして発行・検証する、期限付きのAPIキー。
//! サーバー側に発行済みキーの状態は持たず、有効性はすべて署名済みトークンから再導出する。
//! 失効手段は有効期限のみ。
//!
//! ## クレーム
//! | クレーム | 内容 |
//! |---------|------|
//! | `iss` | 固定値 [`ISSUER`] |
//! | `sub` | 保持者 |
//! | `iat` / `exp` | 発行時刻 / 有効期限（UNIX秒） |
//! | `jti` | 発行ごとに一意なID（UUID v4、追跡用） |
//! | `scope` | カンマ区切りのスコープ |

mod issuer;
mod validator;

pub use issuer::{CredentialIssuer, IssuedCredential};
pub use validator::CredentialValidator;

use chrono::{DateTime, SecondsFormat, Utc};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};

/// 受け付ける唯一の署名アルゴリズム。
pub const PINNED_ALGORITHM: Algorithm = Algorithm::EdDSA;

/// `iss` クレームの固定値。
pub const ISSUER: &str = "attest-gateway";

/// JWTに埋め込むクレーム。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub iss: String,
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
}

/// 検証済み（または発行直後）のAPIキーの内容。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// 保持者
    pub subject: String,
    /// カンマ区切りのスコープ
    pub scope: String,
    /// 発行時刻（UTC）
    pub issued_at: DateTime<Utc>,
    /// 有効期限（UTC）。この時刻ちょうどで無効。
    pub expires_at: DateTime<Utc>,
    /// 発行ごとに一意なID
    pub id: String,
}

impl Credential {
    /// 有効期限をRFC 3339（秒精度）で返す。
    pub fn expires_rfc3339(&self) -> String {
        self.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn from_claims(claims: Claims) -> Result<Self, CredentialError> {
        let issued_at = DateTime::from_timestamp(claims.iat, 0)
            .ok_or_else(|| CredentialError::Malformed("iatが範囲外です".into()))?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| CredentialError::Malformed("expが範囲外です".into()))?;
        if expires_at <= issued_at {
            return Err(CredentialError::Malformed("expがiat以前です".into()));
        }
        Ok(Self {
            subject: claims.sub,
            scope: claims.scope,
            issued_at,
            expires_at,
            id: claims.jti,
        })
    }
}

/// カンマ区切りの `scope` に `required` と完全一致（大文字小文字区別）する要素があるか。
///
/// 各要素の前後の空白は無視する。ワイルドカード・階層スコープはない。
/// `required` が空なら常に `true`。
pub fn scope_grants(scope: &str, required: &str) -> bool {
    required.is_empty() || scope.split(',').any(|s| s.trim() == required)
}

/// APIキー発行・検証のエラー型。
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// subjectが空
    #[error("subjectは必須です")]
    EmptySubject,
    /// 有効期間が0、または表現できない大きさ
    #[error("有効期間が不正です: {0}")]
    InvalidValidity(String),
    /// 署名に失敗（鍵マテリアルの不備）
    #[error("APIキーの署名に失敗: {0}")]
    Signing(String),
    /// トークンの構造・クレームが不正
    #[error("不正なトークン: {0}")]
    Malformed(String),
    /// 固定したアルゴリズム以外で署名されている
    #[error("想定外の署名アルゴリズム: {0}")]
    AlgorithmMismatch(String),
    /// 署名が一致しない
    #[error("署名の検証に失敗")]
    InvalidSignature,
    /// 有効期限切れ
    #[error("APIキーの有効期限が切れています ({0})")]
    Expired(String),
    /// 必要なスコープがない
    #[error("スコープが不足しています: {0}")]
    InsufficientScope(String),
}

/// 検証失敗の分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// 認証失敗（トークンが信用できない）
    Unauthenticated,
    /// 認可失敗（トークンは有効だがスコープ不足）
    Forbidden,
}

impl CredentialError {
    /// 検証失敗を認証失敗・認可失敗に分類する。
    pub fn auth_failure(&self) -> AuthFailure {
        match self {
            CredentialError::InsufficientScope(_) => AuthFailure::Forbidden,
            _ => AuthFailure::Unauthenticated,
        }
    }
}
