//! # Quote種別の判定
//!
//! 生のQuoteバイト列の先頭にある version フィールド（u16 LE, offset 0）から
//! 検証経路を決める。全入力がちょうど1つの種別に対応する全域関数。

use std::fmt;

/// 判定に必要な最小バイト数。
pub const MIN_EVIDENCE_LEN: usize = 4;

/// SGX (ECDSA) Quote v3 の version 値。
pub const SGX_QUOTE_VERSION: u16 = 3;

/// TDX Quote v4 の version 値。
pub const TDX_QUOTE_VERSION: u16 = 4;

/// Quoteの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceFamily {
    /// SGXエンクレーブのQuote（v3）
    Sgx,
    /// TDX Confidential VMのQuote（v4）
    Tdx,
    /// 未対応の形式。`version` は読み取れた場合のみ。
    Unknown { version: Option<u16>, len: usize },
}

impl EvidenceFamily {
    /// ログ表示用の短い名前。
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceFamily::Sgx => "sgx",
            EvidenceFamily::Tdx => "tdx",
            EvidenceFamily::Unknown { .. } => "unknown",
        }
    }
}

impl fmt::Display for EvidenceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quoteの種別を判定する。
///
/// - 4バイト未満 → `Unknown`
/// - version 3 → `Sgx`
/// - version 4 → `Tdx`
/// - それ以外 → `Unknown`
pub fn classify(raw: &[u8]) -> EvidenceFamily {
    let version = read_version(raw);
    if raw.len() < MIN_EVIDENCE_LEN {
        return EvidenceFamily::Unknown {
            version,
            len: raw.len(),
        };
    }
    match version {
        Some(SGX_QUOTE_VERSION) => EvidenceFamily::Sgx,
        Some(TDX_QUOTE_VERSION) => EvidenceFamily::Tdx,
        _ => EvidenceFamily::Unknown {
            version,
            len: raw.len(),
        },
    }
}

/// `Unknown` 判定時にクライアントへ返す説明。
pub fn unsupported_reason(version: Option<u16>, len: usize) -> String {
    match version {
        Some(v) if len >= MIN_EVIDENCE_LEN => format!("Unsupported quote format (version {v})"),
        _ => format!("Unsupported quote format (too short: {len} bytes)"),
    }
}

fn read_version(raw: &[u8]) -> Option<u16> {
    raw.get(..2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_versions() {
        assert_eq!(classify(&[3, 0, 2, 0]), EvidenceFamily::Sgx);
        assert_eq!(classify(&[4, 0, 2, 0, 0x81, 0, 0, 0]), EvidenceFamily::Tdx);
    }

    #[test]
    fn test_classify_short_input() {
        for raw in [&[][..], &[4][..], &[4, 0][..], &[3, 0, 0][..]] {
            assert!(matches!(classify(raw), EvidenceFamily::Unknown { .. }), "{raw:?}");
        }
    }

    /// version以外のバイトや長さは判定に影響しないことを確認
    #[test]
    fn test_classify_is_total() {
        for version in 0u16..=64 {
            for tail in [&[0u8, 0][..], &[0xff, 0xff, 0xff][..], &[1; 700][..]] {
                let mut raw = version.to_le_bytes().to_vec();
                raw.extend_from_slice(tail);
                let family = classify(&raw);
                match version {
                    3 => assert_eq!(family, EvidenceFamily::Sgx),
                    4 => assert_eq!(family, EvidenceFamily::Tdx),
                    _ => assert_eq!(
                        family,
                        EvidenceFamily::Unknown {
                            version: Some(version),
                            len: raw.len()
                        }
                    ),
                }
                assert_eq!(classify(&raw), family);
            }
        }
    }

    /// version は little-endian で読む（0x0300 は 3 ではない）
    #[test]
    fn test_classify_reads_little_endian() {
        assert_eq!(
            classify(&[0, 3, 0, 0]),
            EvidenceFamily::Unknown {
                version: Some(0x0300),
                len: 4
            }
        );
    }

    #[test]
    fn test_unsupported_reason() {
        assert_eq!(
            unsupported_reason(Some(7), 4),
            "Unsupported quote format (version 7)"
        );
        assert_eq!(
            unsupported_reason(Some(4), 2),
            "Unsupported quote format (too short: 2 bytes)"
        );
        assert_eq!(
            unsupported_reason(None, 0),
            "Unsupported quote format (too short: 0 bytes)"
        );
    }
}
