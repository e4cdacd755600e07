//! # 外部ツールによる検証
//!
//! Quoteを一時ファイルに書き出し、DCAP検証ツールを子プロセスとして実行する。
//! 終了コード0なら `Verified`、それ以外は標準出力と標準エラーを連結して `Rejected` とする。
//!
//! 子プロセスはタイムアウトで強制終了する（`kill_on_drop`）。

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use super::scratch::with_scratch_file;
use super::{EvidenceVerifier, VerifierError};
use crate::verdict::Verdict;

/// 引数テンプレート内で一時ファイルのパスに置換されるプレースホルダ。
pub const QUOTE_PLACEHOLDER: &str = "{quote}";

/// デフォルトの引数テンプレート。
pub const DEFAULT_ARGS_TEMPLATE: &str = "-in {quote}";

/// デフォルトのタイムアウト（秒）。
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 外部検証ツールの設定。
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// 実行ファイルのパス
    pub program: PathBuf,
    /// 引数（`{quote}` を含む要素は一時ファイルのパスに置換される）
    pub args: Vec<String>,
    /// 実行時間の上限
    pub timeout: Duration,
    /// 一時ファイルの作成先。`None` の場合はシステムの一時ディレクトリ
    pub scratch_dir: Option<PathBuf>,
}

impl ToolConfig {
    /// デフォルトの引数・タイムアウトで構築する。
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: parse_args_template(DEFAULT_ARGS_TEMPLATE),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            scratch_dir: None,
        }
    }

    /// 一時ファイルのパスを埋め込んだ引数列。
    ///
    /// プレースホルダがどこにもない場合は末尾にパスを追加する。
    pub fn render_args(&self, quote_path: &str) -> Vec<String> {
        let mut rendered: Vec<String> = self
            .args
            .iter()
            .map(|a| a.replace(QUOTE_PLACEHOLDER, quote_path))
            .collect();
        if !self.args.iter().any(|a| a.contains(QUOTE_PLACEHOLDER)) {
            rendered.push(quote_path.to_string());
        }
        rendered
    }
}

/// 空白区切りの引数テンプレートを分解する。
pub fn parse_args_template(template: &str) -> Vec<String> {
    template.split_whitespace().map(str::to_string).collect()
}

/// 外部ツールで検証する [`EvidenceVerifier`]。
#[derive(Debug, Clone)]
pub struct ExternalToolVerifier {
    /// メッセージ用のQuote種別名（"SGX" / "TDX"）
    label: &'static str,
    config: ToolConfig,
}

impl ExternalToolVerifier {
    pub fn new(label: &'static str, config: ToolConfig) -> Self {
        Self { label, config }
    }

    async fn run(&self, quote_path: PathBuf) -> Result<Verdict, VerifierError> {
        let args = self.config.render_args(&quote_path.to_string_lossy());

        let child = tokio::process::Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                VerifierError::Spawn(format!("{}: {e}", self.config.program.display()))
            })?;

        // タイムアウト時は wait_with_output の Future ごと child が破棄され、kill される
        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| VerifierError::Timeout(self.config.timeout))?
            .map_err(|e| VerifierError::Spawn(format!("子プロセスの待機に失敗: {e}")))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(Verdict::Verified(format!("{} quote verified via DCAP", self.label)))
        } else {
            tracing::warn!(
                tool = %self.config.program.display(),
                status = %output.status,
                output = %combined.trim_end(),
                "外部検証ツールが検証失敗を返しました"
            );
            Ok(Verdict::Rejected(format!(
                "{} verification failed: {}",
                self.label, combined
            )))
        }
    }
}

#[async_trait::async_trait]
impl EvidenceVerifier for ExternalToolVerifier {
    fn name(&self) -> &str {
        "external-tool"
    }

    async fn verify(&self, raw: &[u8]) -> Result<Verdict, VerifierError> {
        with_scratch_file(self.config.scratch_dir.as_deref(), raw, |path| self.run(path)).await
    }
}
