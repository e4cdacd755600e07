//! # Quoteの構造デコードと検証ポリシー
//!
//! 生のQuoteを構造化し、検証ポリシー（[`TrustPolicy`]）に照らして判定する。
//! 各Quote形式はサブモジュールとして配置される。
//!
//! ## 対応形式
//!
//! | 形式 | サブモジュール | 署名 | 測定値 |
//! |------|--------------|------|--------|
//! | TDX Quote v4 | [`tdx`] | ECDSA P-256 | MRTD, RTMR0〜RTMR3 |
//! | SGX Quote v3 | （外部ツールで検証） | ECDSA P-256 | MRENCLAVE, MRSIGNER |
//!
//! TDX Quoteの信頼性は [`pck`] がPCK証明書チェーンとQEレポートで確認する。
//! コラテラル/TCBの検証はここでは行わない。必要な場合は外部検証ツール経路
//! （`verifier::tool`）を使う。

pub mod pck;
pub mod tdx;

pub use pck::{PckChainPolicy, QeReportCertData, TrustAnchorError};
pub use tdx::{TdReport, TdxQuote, TdxQuoteHeader};

/// Quoteの構造デコードのエラー型。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteParseError {
    /// 必要なバイト数に足りない
    #[error("{section}の途中でデータが終わっています (offset {offset}, 必要 {needed} bytes)")]
    Truncated {
        section: &'static str,
        offset: usize,
        needed: usize,
    },
    /// 未対応のQuote version
    #[error("未対応のQuote version: {0}")]
    UnsupportedVersion(u16),
    /// TDX以外のTEE種別
    #[error("TDXではないTEE種別: {0:#x}")]
    UnexpectedTeeType(u32),
    /// 未対応のAttestation Key種別
    #[error("未対応のAttestation Key種別: {0}")]
    UnsupportedAttestationKeyType(u16),
    /// 宣言された長さと実データ長の不一致
    #[error("{section}の長さが一致しません (宣言 {declared} bytes, 実際 {actual} bytes)")]
    LengthMismatch {
        section: &'static str,
        declared: usize,
        actual: usize,
    },
}

/// 検証ポリシー違反。構造は正しいが信頼できないQuoteであることを示す。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    /// Attestation Keyが曲線上の点ではない
    #[error("Attestation Keyが不正です")]
    InvalidAttestationKey,
    /// Quote署名の形式が不正
    #[error("Quote署名の形式が不正です")]
    MalformedSignature,
    /// Quote署名が一致しない
    #[error("Quote署名の検証に失敗")]
    BadSignature,
    /// 未対応のCertification Data種別
    #[error("未対応のCertification Data種別: {0}")]
    UnsupportedCertificationData(u16),
    /// Certification Dataの構造が不正
    #[error("Certification Dataが不正です: {0}")]
    CertificationData(String),
    /// PCK証明書チェーンがルートまで辿れない
    #[error("PCK証明書チェーンの検証に失敗: {0}")]
    CertChain(String),
    /// QEレポート署名が一致しない
    #[error("QEレポート署名の検証に失敗")]
    BadQeReportSignature,
    /// QEレポートがAttestation Keyを結び付けていない
    #[error("Attestation KeyがQEレポートに結び付いていません")]
    AttestationKeyNotBound,
    /// その他のポリシー違反
    #[error("{0}")]
    Other(String),
}

/// デコード済みTDX Quoteに対する検証ポリシー。
///
/// 実装を差し替えることで、信頼点やコラテラルを含む検証の厳しさを切り替えられる。
pub trait TrustPolicy: Send + Sync {
    /// ログ・メッセージ用の名前。
    fn name(&self) -> &str;

    /// ポリシーを満たす場合は `Ok(())`。
    fn check(&self, quote: &TdxQuote) -> Result<(), PolicyViolation>;
}
