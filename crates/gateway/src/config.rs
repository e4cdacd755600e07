//! # Gateway設定・共有状態
//!
//! 環境変数からの設定読み込みとGatewayの共有状態の定義。
//!
//! | 環境変数 | 既定値 | 内容 |
//! |---------|-------|------|
//! | `JWT_SIGNING_KEY_FILE` | （必須） | APIキー署名用Ed25519秘密鍵（PKCS#8 PEM） |
//! | `LISTEN_ADDR` | `0.0.0.0:8080` | 待ち受けアドレス |
//! | `TDX_VERIFIER` | `native` | TDX Quoteの検証経路（`native`: PCK証明書チェーン / `tool`） |
//! | `QUOTE_CHECK_TOOL` | `check` | 外部DCAP検証ツールのパス |
//! | `QUOTE_CHECK_ARGS` | `-in {quote}` | 外部ツールの引数テンプレート |
//! | `QUOTE_CHECK_TIMEOUT_SECS` | `30` | 外部ツールの実行時間上限（秒） |
//! | `QUOTE_SCRATCH_DIR` | システムの一時ディレクトリ | Quote一時ファイルの作成先 |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use attest_core::attestation::PckChainPolicy;
use attest_core::verifier::tool::{
    parse_args_template, DEFAULT_ARGS_TEMPLATE, DEFAULT_TIMEOUT_SECS,
};
use attest_core::{
    EvidenceRouter, EvidenceVerifier, ExternalToolVerifier, ParsedQuoteVerifier, ToolConfig,
};
use attest_crypto::{CredentialIssuer, CredentialValidator, KeyMaterial};

/// 既定の待ち受けアドレス。
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// 既定の外部検証ツール。
pub const DEFAULT_QUOTE_CHECK_TOOL: &str = "check";

/// TDX Quoteの検証経路。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TdxVerifierKind {
    /// プロセス内でデコードし、Intel SGX Root CAまでのPCK証明書チェーンを検証
    Native,
    /// SGXと同じ外部ツール
    Tool,
}

impl std::str::FromStr for TdxVerifierKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "tool" => Ok(Self::Tool),
            other => {
                anyhow::bail!("TDX_VERIFIERは native または tool である必要があります: {other}")
            }
        }
    }
}

/// 起動時に一度だけ読み込む設定。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub signing_key_file: PathBuf,
    pub listen_addr: SocketAddr,
    pub tdx_verifier: TdxVerifierKind,
    pub tool: ToolConfig,
}

impl GatewayConfig {
    /// 環境変数から構築する。
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の取得関数から構築する（テスト用に環境変数を差し替えられる）。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let signing_key_file = lookup("JWT_SIGNING_KEY_FILE")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .context("JWT_SIGNING_KEY_FILEが未設定です")?;

        let listen_addr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("LISTEN_ADDRが不正です")?;

        let tdx_verifier = lookup("TDX_VERIFIER")
            .map(|s| s.parse::<TdxVerifierKind>())
            .transpose()?
            .unwrap_or(TdxVerifierKind::Native);

        let timeout_secs = lookup("QUOTE_CHECK_TIMEOUT_SECS")
            .map(|s| s.trim().parse::<u64>())
            .transpose()
            .context("QUOTE_CHECK_TIMEOUT_SECSが不正です")?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            anyhow::bail!("QUOTE_CHECK_TIMEOUT_SECSは1以上である必要があります");
        }

        let program = lookup("QUOTE_CHECK_TOOL")
            .unwrap_or_else(|| DEFAULT_QUOTE_CHECK_TOOL.to_string());
        let args =
            lookup("QUOTE_CHECK_ARGS").unwrap_or_else(|| DEFAULT_ARGS_TEMPLATE.to_string());

        let tool = ToolConfig {
            program: PathBuf::from(program),
            args: parse_args_template(&args),
            timeout: Duration::from_secs(timeout_secs),
            scratch_dir: lookup("QUOTE_SCRATCH_DIR")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        };

        Ok(Self {
            signing_key_file,
            listen_addr,
            tdx_verifier,
            tool,
        })
    }
}

/// Gatewayの共有状態。
///
/// 全フィールドは起動後に不変。リクエスト間でロックなしに共有する。
#[derive(Debug)]
pub struct GatewayState {
    /// APIキー発行者
    pub issuer: CredentialIssuer,
    /// APIキー検証者
    pub validator: Arc<CredentialValidator>,
    /// Quote種別ごとの検証器
    pub router: EvidenceRouter,
}

impl GatewayState {
    pub fn new(keys: Arc<KeyMaterial>, router: EvidenceRouter) -> Self {
        Self {
            issuer: CredentialIssuer::new(keys.clone()),
            validator: Arc::new(CredentialValidator::new(keys)),
            router,
        }
    }

    /// 設定から構築する。鍵ファイルの読み込みに失敗した場合は起動できない。
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let keys = KeyMaterial::from_pem_file(&config.signing_key_file)
            .context("APIキー署名鍵の読み込みに失敗")?;
        Ok(Self::new(Arc::new(keys), build_router(config)?))
    }
}

/// 設定に従って検証器を組み立てる。
///
/// `native` の信頼点（Intel SGX Root CA）を構築できない場合は起動しない。
pub fn build_router(config: &GatewayConfig) -> anyhow::Result<EvidenceRouter> {
    let sgx: Arc<dyn EvidenceVerifier> =
        Arc::new(ExternalToolVerifier::new("SGX", config.tool.clone()));
    let tdx: Arc<dyn EvidenceVerifier> = match config.tdx_verifier {
        TdxVerifierKind::Native => {
            let policy = PckChainPolicy::intel().context("Intel SGX Root CAの読み込みに失敗")?;
            Arc::new(ParsedQuoteVerifier::new(policy))
        }
        TdxVerifierKind::Tool => Arc::new(ExternalToolVerifier::new("TDX", config.tool.clone())),
    };

    tracing::info!(
        sgx = sgx.name(),
        tdx = tdx.name(),
        tool = %config.tool.program.display(),
        timeout_secs = config.tool.timeout.as_secs(),
        "Quote検証器を構成"
    );
    Ok(EvidenceRouter::new(sgx, tdx))
}
