//! # Quote検証器と振り分け
//!
//! Quote種別ごとの検証器を [`EvidenceVerifier`] トレイトで抽象化し、
//! [`EvidenceRouter`] が種別判定の結果に従って振り分ける。
//!
//! ## 検証器
//! - [`native::ParsedQuoteVerifier`]: プロセス内でデコード + [`TrustPolicy`](crate::attestation::TrustPolicy)
//! - [`tool::ExternalToolVerifier`]: 一時ファイル + 外部DCAP検証ツール

pub mod native;
pub mod scratch;
pub mod tool;

use std::sync::Arc;
use std::time::Duration;

use crate::evidence::{classify, unsupported_reason, EvidenceFamily};
use crate::verdict::Verdict;

pub use native::ParsedQuoteVerifier;
pub use scratch::with_scratch_file;
pub use tool::{ExternalToolVerifier, ToolConfig};

/// 検証処理そのものの失敗。Quoteに対する判定（[`Verdict`]）とは区別する。
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    /// 一時ファイルの作成・書き込みに失敗
    #[error("一時ファイルの操作に失敗: {0}")]
    Scratch(#[source] std::io::Error),
    /// 外部ツールの起動・待機に失敗
    #[error("外部検証ツールの実行に失敗: {0}")]
    Spawn(String),
    /// 外部ツールが上限時間内に終了しなかった
    #[error("外部検証ツールがタイムアウトしました ({0:?})")]
    Timeout(Duration),
}

/// 生のQuoteを判定する検証器。
#[async_trait::async_trait]
pub trait EvidenceVerifier: Send + Sync {
    /// ログ用の名前。
    fn name(&self) -> &str;

    /// Quoteを検証する。
    async fn verify(&self, raw: &[u8]) -> Result<Verdict, VerifierError>;
}

/// Quote種別ごとの検証器への振り分け。
#[derive(Clone)]
pub struct EvidenceRouter {
    sgx: Arc<dyn EvidenceVerifier>,
    tdx: Arc<dyn EvidenceVerifier>,
}

impl EvidenceRouter {
    pub fn new(sgx: Arc<dyn EvidenceVerifier>, tdx: Arc<dyn EvidenceVerifier>) -> Self {
        Self { sgx, tdx }
    }

    /// 種別を判定して検証する。
    ///
    /// `Unknown` は検証器に渡さず `Malformed` とする。
    pub async fn route(&self, raw: &[u8]) -> Result<(EvidenceFamily, Verdict), VerifierError> {
        let family = classify(raw);
        let verifier = match family {
            EvidenceFamily::Sgx => &self.sgx,
            EvidenceFamily::Tdx => &self.tdx,
            EvidenceFamily::Unknown { version, len } => {
                tracing::info!(family = %family, bytes = raw.len(), ?version, "未対応のQuote形式");
                return Ok((family, Verdict::Malformed(unsupported_reason(version, len))));
            }
        };

        tracing::info!(
            family = %family,
            bytes = raw.len(),
            verifier = verifier.name(),
            "Quote検証を開始"
        );
        let verdict = verifier.verify(raw).await?;
        tracing::info!(family = %family, verdict = verdict.kind(), "Quote検証が完了");

        Ok((family, verdict))
    }
}

impl std::fmt::Debug for EvidenceRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceRouter")
            .field("sgx", &self.sgx.name())
            .field("tdx", &self.tdx.name())
            .finish()
    }
}
