//! # Attest Gateway CLI
//!
//! ネットワークを介さずにAPIキーを発行する。
//!
//! ```text
//! attest-cli issue --subject acme --scope verify --days 30 [--key /keys/jwt.pem]
//! ```
//!
//! 鍵ファイルは `--key`、省略時は環境変数 `JWT_SIGNING_KEY_FILE`。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use attest_crypto::{CredentialIssuer, IssuedCredential, KeyMaterial};
use attest_types::{DEFAULT_DAYS_VALID, DEFAULT_SCOPE};
use clap::{Parser, Subcommand};

/// 鍵ファイルのパスを指定する環境変数。
const KEY_FILE_ENV: &str = "JWT_SIGNING_KEY_FILE";

/// `--subject` 省略時の保持者。
const DEFAULT_SUBJECT: &str = "user";

#[derive(Parser)]
#[command(name = "attest-cli", about = "Attest Gateway CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// APIキーを発行する
    Issue(IssueArgs),
}

#[derive(clap::Args, Debug)]
struct IssueArgs {
    /// APIキーの保持者
    #[arg(long, default_value = DEFAULT_SUBJECT)]
    subject: String,
    /// カンマ区切りのスコープ
    #[arg(long, default_value = DEFAULT_SCOPE)]
    scope: String,
    /// 有効日数（0以下は30日）
    #[arg(long, default_value_t = DEFAULT_DAYS_VALID, allow_negative_numbers = true)]
    days: i64,
    /// Ed25519秘密鍵（PKCS#8 PEM）のパス
    #[arg(long)]
    key: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Issue(args) => {
            let key_path = resolve_key_path(args.key.clone(), std::env::var(KEY_FILE_ENV).ok())?;
            let issued = issue(&args, &key_path)?;
            println!("Subject: {}", issued.credential.subject);
            println!("Scope:   {}", issued.credential.scope);
            println!("Expires: {}", issued.credential.expires_rfc3339());
            println!("Token:   {}", issued.token);
        }
    }
    Ok(())
}

/// `--key` を優先し、なければ環境変数の値を使う。
fn resolve_key_path(flag: Option<PathBuf>, env: Option<String>) -> anyhow::Result<PathBuf> {
    flag.or_else(|| env.filter(|s| !s.is_empty()).map(PathBuf::from))
        .with_context(|| format!("鍵ファイルを --key または {KEY_FILE_ENV} で指定してください"))
}

fn issue(args: &IssueArgs, key_path: &std::path::Path) -> anyhow::Result<IssuedCredential> {
    let keys = KeyMaterial::from_pem_file(key_path)
        .with_context(|| format!("鍵ファイルの読み込みに失敗: {}", key_path.display()))?;
    let issuer = CredentialIssuer::new(Arc::new(keys));

    let scope = match args.scope.trim() {
        "" => DEFAULT_SCOPE,
        s => s,
    };
    let days = if args.days <= 0 { DEFAULT_DAYS_VALID } else { args.days };
    let validity = u64::try_from(days)
        .ok()
        .and_then(|d| d.checked_mul(24 * 60 * 60))
        .map(Duration::from_secs)
        .context("有効日数が大きすぎます")?;

    let issued = issuer.issue(&args.subject, scope, validity)?;
    tracing::info!(
        subject = %issued.credential.subject,
        jti = %issued.credential.id,
        "APIキーを発行"
    );
    Ok(issued)
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_crypto::CredentialValidator;
    use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
    use ed25519_dalek::pkcs8::EncodePrivateKey;
    use ed25519_dalek::SigningKey;

    /// テスト用の鍵ファイルを書き出し、その鍵の検証者と一緒に返す
    fn key_file(dir: &std::path::Path) -> (PathBuf, CredentialValidator) {
        let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
        let path = dir.join("jwt.pem");
        let pem = signing_key.to_pkcs8_pem(LineEnding::LF).unwrap();
        std::fs::write(&path, pem.as_bytes()).unwrap();
        let keys = KeyMaterial::from_signing_key(&signing_key).unwrap();
        (path, CredentialValidator::new(Arc::new(keys)))
    }

    fn parse(args: &[&str]) -> IssueArgs {
        match Cli::try_parse_from(args).unwrap().cmd {
            Command::Issue(a) => a,
        }
    }

    #[test]
    fn test_issue_defaults() {
        let args = parse(&["attest-cli", "issue"]);
        assert_eq!(args.subject, "user");
        assert_eq!(args.scope, "verify");
        assert_eq!(args.days, 30);
        assert!(args.key.is_none());
    }

    #[test]
    fn test_issue_token_validates() {
        let dir = tempfile::tempdir().unwrap();
        let (path, validator) = key_file(dir.path());
        let args = parse(&[
            "attest-cli",
            "issue",
            "--subject",
            "acme",
            "--scope",
            "verify,admin",
            "--days",
            "2",
        ]);

        let issued = issue(&args, &path).unwrap();
        let credential = validator.validate(&issued.token, "admin").unwrap();

        assert_eq!(credential.subject, "acme");
        assert_eq!(
            credential.expires_at - credential.issued_at,
            chrono_days(2)
        );
    }

    /// 0以下の日数は30日になることを確認
    #[test]
    fn test_issue_non_positive_days() {
        let dir = tempfile::tempdir().unwrap();
        let (path, _) = key_file(dir.path());
        let args = parse(&["attest-cli", "issue", "--days", "-3"]);

        let issued = issue(&args, &path).unwrap();
        let c = issued.credential;
        assert_eq!(c.expires_at - c.issued_at, chrono_days(30));
    }

    #[test]
    fn test_resolve_key_path() {
        assert_eq!(
            resolve_key_path(Some("/a.pem".into()), Some("/b.pem".into())).unwrap(),
            PathBuf::from("/a.pem")
        );
        assert_eq!(
            resolve_key_path(None, Some("/b.pem".into())).unwrap(),
            PathBuf::from("/b.pem")
        );
        assert!(resolve_key_path(None, Some(String::new())).is_err());
        assert!(resolve_key_path(None, None).is_err());
    }

    #[test]
    fn test_issue_missing_key_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = parse(&["attest-cli", "issue"]);
        assert!(issue(&args, &dir.path().join("missing.pem")).is_err());
    }

    fn chrono_days(days: i64) -> chrono::TimeDelta {
        chrono::TimeDelta::days(days)
    }
}
