//! # Attest Gateway Core
//!
//! Quoteの種別判定、検証器への振り分け、検証結果の正規化を実装する。
//!
//! ## 処理フロー
//! 1. Quote先頭の version（u16 LE）から種別を判定する（[`evidence::classify`]）
//! 2. 種別ごとの検証器（[`verifier::EvidenceVerifier`]）に振り分ける
//! 3. 検証器は `Verified` / `Rejected` / `Malformed` のいずれかを返す（[`verdict::Verdict`]）
//!
//! 未対応の形式は検証器に渡さず `Malformed` とする。

pub mod attestation;
pub mod evidence;
pub mod verdict;
pub mod verifier;

pub use evidence::{classify, EvidenceFamily};
pub use verdict::Verdict;
pub use verifier::{
    EvidenceRouter, EvidenceVerifier, ExternalToolVerifier, ParsedQuoteVerifier, ToolConfig,
    VerifierError,
};
