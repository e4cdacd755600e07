//! # TDX Quote v4
//!
//! ## Quote構造
//!
//! ```text
//! +--------------------+ 0
//! | Header (48)        |  version, att_key_type, tee_type, qe_svn, pce_svn,
//! |                    |  qe_vendor_id, user_data
//! +--------------------+ 48
//! | TD Report (584)    |  tee_tcb_svn, MRSEAM, MRSIGNERSEAM, SEAM/TD attributes,
//! |                    |  XFAM, MRTD, MRCONFIGID, MROWNER, MROWNERCONFIG,
//! |                    |  RTMR0..3, REPORTDATA
//! +--------------------+ 632
//! | sig_data_len (u32) |
//! +--------------------+ 636
//! | Quote署名 (64)      |  ECDSA P-256 (r || s), 対象は Header || TD Report
//! | Attestation Key(64)|  P-256公開鍵 (x || y)
//! | Cert Data Type(u16)|
//! | Cert Data Size(u32)|
//! | Cert Data          |  種別6: QEレポート・PCK証明書チェーン（[`super::pck`]）
//! +--------------------+
//! ```

use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};

use super::{PolicyViolation, QuoteParseError};
use crate::evidence::TDX_QUOTE_VERSION;

/// ヘッダーサイズ。
pub const HEADER_SIZE: usize = 48;
/// TD Reportサイズ。
pub const TD_REPORT_SIZE: usize = 584;
/// 署名対象（Header || TD Report）のサイズ。
pub const SIGNED_REGION_SIZE: usize = HEADER_SIZE + TD_REPORT_SIZE;
/// Quote署名のサイズ。
pub const QUOTE_SIGNATURE_SIZE: usize = 64;
/// Attestation Key（非圧縮点からプレフィックスを除いたもの）のサイズ。
pub const ATTESTATION_KEY_SIZE: usize = 64;
/// ヘッダー `tee_type` のTDX値。
pub const TEE_TYPE_TDX: u32 = 0x81;
/// ヘッダー `att_key_type` のECDSA-256-with-P-256値。
pub const ATT_KEY_TYPE_ECDSA_P256: u16 = 2;

/// 測定値レジスタ1本のサイズ（SHA-384）。
pub type Measurement = [u8; 48];

/// Quoteヘッダー。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdxQuoteHeader {
    pub version: u16,
    pub attestation_key_type: u16,
    pub tee_type: u32,
    pub qe_svn: u16,
    pub pce_svn: u16,
    pub qe_vendor_id: [u8; 16],
    pub user_data: [u8; 20],
}

/// TD Report（Quote本体）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdReport {
    pub tee_tcb_svn: [u8; 16],
    pub mr_seam: Measurement,
    pub mr_signer_seam: Measurement,
    pub seam_attributes: [u8; 8],
    pub td_attributes: [u8; 8],
    pub xfam: [u8; 8],
    /// TD初期内容の測定値
    pub mr_td: Measurement,
    pub mr_config_id: Measurement,
    pub mr_owner: Measurement,
    pub mr_owner_config: Measurement,
    /// ランタイム拡張測定レジスタ RTMR0〜RTMR3
    pub rtmr: [Measurement; 4],
    /// TDが任意に設定する64バイト（ノンス・公開鍵ハッシュ等）
    pub report_data: [u8; 64],
}

/// デコード済みTDX Quote v4。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TdxQuote {
    pub header: TdxQuoteHeader,
    pub td_report: TdReport,
    /// Quote署名 (r || s)
    pub signature: [u8; QUOTE_SIGNATURE_SIZE],
    /// Attestation Key (x || y)
    pub attestation_key: [u8; ATTESTATION_KEY_SIZE],
    pub certification_data_type: u16,
    pub certification_data: Vec<u8>,
    signed_region: Vec<u8>,
}

impl TdxQuote {
    /// 生バイト列をデコードする。
    ///
    /// 長さ不足・version不一致・TEE種別不一致・未対応の鍵種別・長さフィールドの不整合は
    /// すべてデコード失敗とする。
    pub fn parse(raw: &[u8]) -> Result<Self, QuoteParseError> {
        let mut r = Reader::new(raw);

        let header = TdxQuoteHeader {
            version: r.u16("header")?,
            attestation_key_type: r.u16("header")?,
            tee_type: r.u32("header")?,
            qe_svn: r.u16("header")?,
            pce_svn: r.u16("header")?,
            qe_vendor_id: r.array("header")?,
            user_data: r.array("header")?,
        };
        if header.version != TDX_QUOTE_VERSION {
            return Err(QuoteParseError::UnsupportedVersion(header.version));
        }
        if header.tee_type != TEE_TYPE_TDX {
            return Err(QuoteParseError::UnexpectedTeeType(header.tee_type));
        }
        if header.attestation_key_type != ATT_KEY_TYPE_ECDSA_P256 {
            return Err(QuoteParseError::UnsupportedAttestationKeyType(
                header.attestation_key_type,
            ));
        }

        let td_report = TdReport {
            tee_tcb_svn: r.array("td_report")?,
            mr_seam: r.array("td_report")?,
            mr_signer_seam: r.array("td_report")?,
            seam_attributes: r.array("td_report")?,
            td_attributes: r.array("td_report")?,
            xfam: r.array("td_report")?,
            mr_td: r.array("td_report")?,
            mr_config_id: r.array("td_report")?,
            mr_owner: r.array("td_report")?,
            mr_owner_config: r.array("td_report")?,
            rtmr: [
                r.array("td_report")?,
                r.array("td_report")?,
                r.array("td_report")?,
                r.array("td_report")?,
            ],
            report_data: r.array("td_report")?,
        };
        let signed_region = raw[..SIGNED_REGION_SIZE].to_vec();

        let sig_data_len = r.u32("signature_data")? as usize;
        if sig_data_len != r.remaining() {
            return Err(QuoteParseError::LengthMismatch {
                section: "signature_data",
                declared: sig_data_len,
                actual: r.remaining(),
            });
        }

        let signature = r.array("signature_data")?;
        let attestation_key = r.array("signature_data")?;
        let certification_data_type = r.u16("certification_data")?;
        let cert_len = r.u32("certification_data")? as usize;
        if cert_len != r.remaining() {
            return Err(QuoteParseError::LengthMismatch {
                section: "certification_data",
                declared: cert_len,
                actual: r.remaining(),
            });
        }
        let certification_data = r.take("certification_data", cert_len)?.to_vec();

        Ok(Self {
            header,
            td_report,
            signature,
            attestation_key,
            certification_data_type,
            certification_data,
            signed_region,
        })
    }

    /// Quote署名の対象（Header || TD Report）。
    pub fn signed_region(&self) -> &[u8] {
        &self.signed_region
    }

    /// 埋め込まれたAttestation KeyでQuote署名を検証する。
    ///
    /// Attestation Key自体の正当性は [`super::PckChainPolicy`] が確認する。
    pub fn verify_signature(&self) -> Result<(), PolicyViolation> {
        let key = attestation_key(&self.attestation_key)?;
        let signature = Signature::from_slice(&self.signature)
            .map_err(|_| PolicyViolation::MalformedSignature)?;

        key.verify(self.signed_region(), &signature)
            .map_err(|_| PolicyViolation::BadSignature)
    }
}

/// Attestation Key (x || y) をP-256公開鍵に変換する。
fn attestation_key(raw: &[u8; ATTESTATION_KEY_SIZE]) -> Result<VerifyingKey, PolicyViolation> {
    let mut sec1 = [0u8; 1 + ATTESTATION_KEY_SIZE];
    sec1[0] = 0x04;
    sec1[1..].copy_from_slice(raw);
    VerifyingKey::from_sec1_bytes(&sec1).map_err(|_| PolicyViolation::InvalidAttestationKey)
}

/// 固定長フィールドを先頭から順に読み出すカーソル。
pub(super) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(super) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(super) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(super) fn take(
        &mut self,
        section: &'static str,
        n: usize,
    ) -> Result<&'a [u8], QuoteParseError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(QuoteParseError::Truncated {
                section,
                offset: self.pos,
                needed: n,
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(super) fn array<const N: usize>(
        &mut self,
        section: &'static str,
    ) -> Result<[u8; N], QuoteParseError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(section, N)?);
        Ok(out)
    }

    pub(super) fn u16(&mut self, section: &'static str) -> Result<u16, QuoteParseError> {
        self.array(section).map(u16::from_le_bytes)
    }

    pub(super) fn u32(&mut self, section: &'static str) -> Result<u32, QuoteParseError> {
        self.array(section).map(u32::from_le_bytes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::attestation::pck::CERT_DATA_TYPE_QE_REPORT;
    use p256::ecdsa::signature::Signer;
    use p256::ecdsa::SigningKey;

    /// テスト用のTDX Quoteを組み立てる。`key` で署名し、`cert_data` を種別6として格納する。
    pub(crate) fn build_quote(
        key: &SigningKey,
        report_data: [u8; 64],
        cert_data: &[u8],
    ) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&TDX_QUOTE_VERSION.to_le_bytes());
        raw.extend_from_slice(&ATT_KEY_TYPE_ECDSA_P256.to_le_bytes());
        raw.extend_from_slice(&TEE_TYPE_TDX.to_le_bytes());
        raw.extend_from_slice(&[0u8; HEADER_SIZE - 8]);

        let mut report = vec![0u8; TD_REPORT_SIZE];
        report[136..184].fill(0xAB); // MRTD
        report[TD_REPORT_SIZE - 64..].copy_from_slice(&report_data);
        raw.extend_from_slice(&report);

        let signature: Signature = key.sign(&raw);
        let point = VerifyingKey::from(key).to_encoded_point(false);

        let mut sig_data = Vec::new();
        sig_data.extend_from_slice(&signature.to_bytes());
        sig_data.extend_from_slice(&point.as_bytes()[1..]);
        sig_data.extend_from_slice(&CERT_DATA_TYPE_QE_REPORT.to_le_bytes());
        sig_data.extend_from_slice(&(cert_data.len() as u32).to_le_bytes());
        sig_data.extend_from_slice(cert_data);

        raw.extend_from_slice(&(sig_data.len() as u32).to_le_bytes());
        raw.extend_from_slice(&sig_data);
        raw
    }

    fn test_key() -> SigningKey {
        SigningKey::random(&mut rand::rngs::OsRng)
    }

    fn quote(report_data: [u8; 64]) -> Vec<u8> {
        build_quote(&test_key(), report_data, b"cert-data")
    }

    #[test]
    fn test_parse_fields() {
        let raw = quote([7u8; 64]);
        let quote = TdxQuote::parse(&raw).unwrap();

        assert_eq!(quote.header.version, 4);
        assert_eq!(quote.header.tee_type, TEE_TYPE_TDX);
        assert_eq!(quote.td_report.mr_td, [0xAB; 48]);
        assert_eq!(quote.td_report.report_data, [7u8; 64]);
        assert_eq!(quote.certification_data_type, CERT_DATA_TYPE_QE_REPORT);
        assert_eq!(quote.certification_data, b"cert-data");
        assert_eq!(quote.signed_region().len(), SIGNED_REGION_SIZE);
    }

    /// 4バイトのversion 4のみ、など途中で切れた入力はTruncatedになることを確認
    #[test]
    fn test_parse_truncated() {
        let raw = quote([0u8; 64]);

        for len in [4, HEADER_SIZE, SIGNED_REGION_SIZE, SIGNED_REGION_SIZE + 2] {
            let err = TdxQuote::parse(&raw[..len]).unwrap_err();
            assert!(matches!(err, QuoteParseError::Truncated { .. }), "len={len}: {err}");
        }
    }

    #[test]
    fn test_parse_length_mismatch() {
        let mut raw = quote([0u8; 64]);
        raw.push(0);
        assert!(matches!(
            TdxQuote::parse(&raw),
            Err(QuoteParseError::LengthMismatch { section: "signature_data", .. })
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_header() {
        let base = quote([0u8; 64]);

        let mut raw = base.clone();
        raw[0] = 3;
        assert_eq!(TdxQuote::parse(&raw), Err(QuoteParseError::UnsupportedVersion(3)));

        let mut raw = base.clone();
        raw[4] = 0;
        assert_eq!(TdxQuote::parse(&raw), Err(QuoteParseError::UnexpectedTeeType(0)));

        let mut raw = base;
        raw[2] = 3;
        assert_eq!(
            TdxQuote::parse(&raw),
            Err(QuoteParseError::UnsupportedAttestationKeyType(3))
        );
    }

    #[test]
    fn test_verify_signature() {
        let raw = quote([1u8; 64]);
        let quote = TdxQuote::parse(&raw).unwrap();
        assert_eq!(quote.verify_signature(), Ok(()));
    }

    /// 署名後にTD Reportを書き換えると署名検証に失敗することを確認
    #[test]
    fn test_verify_signature_rejects_tampered_report() {
        let mut raw = quote([1u8; 64]);
        raw[HEADER_SIZE + 136] ^= 0xFF;
        let quote = TdxQuote::parse(&raw).unwrap();
        assert_eq!(quote.verify_signature(), Err(PolicyViolation::BadSignature));
    }

    #[test]
    fn test_verify_signature_rejects_invalid_key() {
        let raw = quote([1u8; 64]);
        let mut quote = TdxQuote::parse(&raw).unwrap();
        quote.attestation_key = [0u8; ATTESTATION_KEY_SIZE];
        assert_eq!(
            quote.verify_signature(),
            Err(PolicyViolation::InvalidAttestationKey)
        );
    }
}
