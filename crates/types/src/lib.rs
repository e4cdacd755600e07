//! # Attest Gateway 共有型定義
//!
//! Gateway・CLI間で共有するHTTPリクエスト/レスポンスのJSON構造を提供する。
//!
//! ## エンコーディング規則
//! - Base64 (Standard): Quoteのバイナリデータ
//! - RFC 3339 (UTC): 有効期限などの絶対時刻

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// スコープ・既定値
// ---------------------------------------------------------------------------

/// /api/verify に必要なスコープ。
pub const SCOPE_VERIFY: &str = "verify";

/// /api/issue に必要なスコープ。
pub const SCOPE_ADMIN: &str = "admin";

/// スコープ省略時の既定値。
pub const DEFAULT_SCOPE: &str = SCOPE_VERIFY;

/// `days_valid` が0以下の場合に適用する有効日数。
pub const DEFAULT_DAYS_VALID: i64 = 30;

/// 検証成功時の `status`。
pub const STATUS_OK: &str = "OK";

/// 検証失敗（否定的な判定）時の `status`。
pub const STATUS_VERIFICATION_FAILED: &str = "VERIFICATION_FAILED";

// ---------------------------------------------------------------------------
// POST /api/issue
// ---------------------------------------------------------------------------

/// POST /api/issue のリクエストボディ。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueRequest {
    /// APIキーの保持者（例: "acme-corp", "alice@example.com"）
    #[serde(default)]
    pub subject: String,
    /// カンマ区切りのスコープ（例: "verify", "verify,admin"）。空の場合は "verify"。
    #[serde(default)]
    pub scope: String,
    /// 有効日数。0以下の場合は30日。
    #[serde(default, alias = "daysValid")]
    pub days_valid: i64,
}

/// POST /api/issue のレスポンスボディ。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueResponse {
    /// 署名済みAPIキー（JWT）
    pub token: String,
    /// 保持者
    pub subject: String,
    /// 付与されたスコープ
    pub scope: String,
    /// 有効期限（RFC 3339, UTC）
    pub expires: String,
}

// ---------------------------------------------------------------------------
// POST /api/verify
// ---------------------------------------------------------------------------

/// POST /api/verify のリクエストボディ。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Base64エンコードされた生のQuoteバイト列
    #[serde(default)]
    pub quote: String,
}

/// 正規化されたレスポンス。
///
/// /api/verify の結果と、全エンドポイントのエラー応答で共通の形を使う。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// 検証に成功したか
    pub success: bool,
    /// `"OK"` または `"VERIFICATION_FAILED"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// 人間向けの説明
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// エラー内容
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VerifyResponse {
    /// `success: false` のエラー応答を構築する。
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}
