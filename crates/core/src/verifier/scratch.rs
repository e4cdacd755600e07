//! # 一時ファイル
//!
//! 外部検証ツールへQuoteを渡すための一時ファイルを、作成から削除まで1つのスコープで扱う。

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::VerifierError;

/// 一時ファイル名のプレフィックス。
pub const SCRATCH_PREFIX: &str = "quote-";
/// 一時ファイル名のサフィックス。
pub const SCRATCH_SUFFIX: &str = ".dat";

/// `bytes` を書き込んだ一時ファイルを作成し、そのパスで `f` を実行する。
///
/// `f` の結果に関わらず、戻る前に一時ファイルを削除する。
/// 返された Future が途中で破棄された場合も `TempPath` のDropで削除される。
///
/// `dir` が `None` の場合はシステムの一時ディレクトリを使う。
pub async fn with_scratch_file<F, Fut, T>(
    dir: Option<&Path>,
    bytes: &[u8],
    f: F,
) -> Result<T, VerifierError>
where
    F: FnOnce(PathBuf) -> Fut,
    Fut: Future<Output = Result<T, VerifierError>>,
{
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX).suffix(SCRATCH_SUFFIX);
    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(VerifierError::Scratch)?;

    // 書き込み失敗時は NamedTempFile のDropで削除される
    file.write_all(bytes).map_err(VerifierError::Scratch)?;
    file.flush().map_err(VerifierError::Scratch)?;

    // ハンドルを閉じてパスのみ保持する（外部プロセスが開けるように）
    let path = file.into_temp_path();
    let result = f(path.to_path_buf()).await;

    let shown = path.to_path_buf();
    if let Err(e) = path.close() {
        tracing::warn!(path = %shown.display(), error = %e, "一時ファイルの削除に失敗");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_scratch_file_contents_and_cleanup() {
        let dir = tempfile::tempdir().unwrap();

        let seen = with_scratch_file(Some(dir.path()), b"\x03\x00quote", |path| async move {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with(SCRATCH_PREFIX) && name.ends_with(SCRATCH_SUFFIX));
            Ok(std::fs::read(&path).unwrap())
        })
        .await
        .unwrap();

        assert_eq!(seen, b"\x03\x00quote");
        assert_eq!(entries(dir.path()), 0);
    }

    /// クロージャがエラーを返しても一時ファイルは残らないことを確認
    #[tokio::test]
    async fn test_scratch_file_removed_on_error() {
        let dir = tempfile::tempdir().unwrap();

        let result: Result<(), _> = with_scratch_file(Some(dir.path()), b"data", |_| async {
            Err(VerifierError::Spawn("boom".to_string()))
        })
        .await;

        assert!(matches!(result, Err(VerifierError::Spawn(_))));
        assert_eq!(entries(dir.path()), 0);
    }

    /// Futureが途中で破棄された場合も一時ファイルは残らないことを確認
    #[tokio::test]
    async fn test_scratch_file_removed_on_cancel() {
        let dir = tempfile::tempdir().unwrap();

        let fut = with_scratch_file(Some(dir.path()), b"data", |_| async {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            Ok(())
        });
        let cancelled = tokio::time::timeout(std::time::Duration::from_millis(50), fut).await;

        assert!(cancelled.is_err());
        assert_eq!(entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_scratch_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let result: Result<(), _> =
            with_scratch_file(Some(&missing), b"data", |_| async { Ok(()) }).await;

        assert!(matches!(result, Err(VerifierError::Scratch(_))));
    }
}
