//! # PCK証明書チェーンによるTDX Quote検証
//!
//! Quote署名に使われたAttestation Keyが、ルート証明書まで辿れるPCK証明書の下で
//! Quoting Enclaveにより生成されたことを確認する。
//!
//! ## 検証手順
//! 1. Attestation KeyでQuote署名を検証
//! 2. Certification Data（種別6）からQEレポート・QE認証データ・PCK証明書チェーン（種別5）を取り出す
//! 3. PCK証明書チェーンを固定したルート証明書まで検証（署名・有効期間）
//! 4. PCKリーフ証明書の公開鍵でQEレポート署名を検証
//! 5. QEレポートのREPORTDATAが `SHA-256(Attestation Key || QE認証データ) || 0x00 * 32` であることを確認
//!
//! コラテラル（TCB Info・QE Identity・CRL）は検証しない。

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use der::{Decode, Encode};
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{DerSignature, Signature, VerifyingKey};
use sha2::{Digest, Sha256};
use x509_cert::Certificate;

use super::tdx::{Reader, TdxQuote, QUOTE_SIGNATURE_SIZE};
use super::{PolicyViolation, QuoteParseError, TrustPolicy};

/// Intel SGX Root CA（DER形式、base64エンコード）。
///
/// Subject: CN=Intel SGX Root CA, O=Intel Corporation, L=Santa Clara, ST=CA, C=US
/// Validity: 2018-05-21 ~ 2049-12-31
/// Algorithm: ECDSA P-256
const INTEL_SGX_ROOT_CA_B64: &str = "\
MIICjzCCAjSgAwIBAgIUImUM1lqdNInzg7SVUr9QGzknBqwwCgYIKoZIzj0EAwIw\
aDEaMBgGA1UEAwwRSW50ZWwgU0dYIFJvb3QgQ0ExGjAYBgNVBAoMEUludGVsIENv\
cnBvcmF0aW9uMRQwEgYDVQQHDAtTYW50YSBDbGFyYTELMAkGA1UECAwCQ0ExCzAJ\
BgNVBAYTAlVTMB4XDTE4MDUyMTEwNDUxMFoXDTQ5MTIzMTIzNTk1OVowaDEaMBgG\
A1UEAwwRSW50ZWwgU0dYIFJvb3QgQ0ExGjAYBgNVBAoMEUludGVsIENvcnBvcmF0\
aW9uMRQwEgYDVQQHDAtTYW50YSBDbGFyYTELMAkGA1UECAwCQ0ExCzAJBgNVBAYT\
AlVTMFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAEC6nEwMDIYZOj/iPWsCzaEKi7\
1OiOSLRFhWGjbnBVJfVnkY4u3IjkDYYL0MxO4mqsyYjlBalTVYxFP2sJBK5zlKOB\
uzCBuDAfBgNVHSMEGDAWgBQiZQzWWp00ifODtJVSv1AbOScGrDBSBgNVHR8ESzBJ\
MEegRaBDhkFodHRwczovL2NlcnRpZmljYXRlcy50cnVzdGVkc2VydmljZXMuaW50\
ZWwuY29tL0ludGVsU0dYUm9vdENBLmRlcjAdBgNVHQ4EFgQUImUM1lqdNInzg7SV\
Ur9QGzknBqwwDgYDVR0PAQH/BAQDAgEGMBIGA1UdEwEB/wQIMAYBAf8CAQEwCgYI\
KoZIzj0EAwIDSQAwRgIhAOW/5QkR+S9CiSDcNoowLuPRLsWGf/Yi7GSX94BgwTwg\
AiEA4J0lrHoMs+Xo5o/sX6O9QWxHRAvZUGOdRQ7cvqRXaqI=";

/// Certification Data種別: PCK証明書チェーン（PEM連結）。
pub const CERT_DATA_TYPE_PCK_CHAIN: u16 = 5;
/// Certification Data種別: QEレポート + PCK証明書チェーン。
pub const CERT_DATA_TYPE_QE_REPORT: u16 = 6;
/// QEレポート（SGX Report Body）のサイズ。
pub const QE_REPORT_SIZE: usize = 384;
/// QEレポート内のREPORTDATAの位置。
const QE_REPORT_DATA_OFFSET: usize = 320;

/// 信頼点（ルート証明書）の構築エラー。
#[derive(Debug, thiserror::Error)]
pub enum TrustAnchorError {
    #[error("ルート証明書のBase64デコードに失敗: {0}")]
    Base64(String),
    #[error("ルート証明書のパースに失敗: {0}")]
    Parse(String),
    #[error("ルート証明書の自己署名検証に失敗: {0}")]
    SelfSignature(String),
}

/// Certification Data 種別6の内容。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QeReportCertData {
    /// Quoting EnclaveのSGXレポート
    pub qe_report: [u8; QE_REPORT_SIZE],
    /// PCK鍵によるQEレポート署名 (r || s)
    pub qe_report_signature: [u8; QUOTE_SIGNATURE_SIZE],
    pub qe_auth_data: Vec<u8>,
    pub pck_chain_type: u16,
    /// PCK証明書チェーン（リーフ → 中間CA → ルート、PEM連結）
    pub pck_chain: Vec<u8>,
}

impl QeReportCertData {
    pub fn parse(raw: &[u8]) -> Result<Self, QuoteParseError> {
        let mut r = Reader::new(raw);

        let qe_report = r.array("qe_report")?;
        let qe_report_signature = r.array("qe_report")?;
        let auth_len = r.u16("qe_auth_data")? as usize;
        let qe_auth_data = r.take("qe_auth_data", auth_len)?.to_vec();
        let pck_chain_type = r.u16("pck_cert_chain")?;
        let chain_len = r.u32("pck_cert_chain")? as usize;
        let pck_chain = r.take("pck_cert_chain", chain_len)?.to_vec();

        Ok(Self {
            qe_report,
            qe_report_signature,
            qe_auth_data,
            pck_chain_type,
            pck_chain,
        })
    }

    /// QEレポートのREPORTDATA（64バイト）。
    pub fn report_data(&self) -> &[u8] {
        &self.qe_report[QE_REPORT_DATA_OFFSET..]
    }
}

/// PCK証明書チェーンを固定ルートまで検証するポリシー。
#[derive(Debug, Clone)]
pub struct PckChainPolicy {
    root: Certificate,
    root_der: Vec<u8>,
}

impl PckChainPolicy {
    /// Intel SGX Root CAを信頼点とする。
    pub fn intel() -> Result<Self, TrustAnchorError> {
        let root_der = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            INTEL_SGX_ROOT_CA_B64,
        )
        .map_err(|e| TrustAnchorError::Base64(e.to_string()))?;
        Self::with_root_der(root_der)
    }

    /// 任意の自己署名ルート証明書（DER）を信頼点とする。
    pub fn with_root_der(root_der: Vec<u8>) -> Result<Self, TrustAnchorError> {
        let root = Certificate::from_der(&root_der)
            .map_err(|e| TrustAnchorError::Parse(e.to_string()))?;
        verify_cert_signature(&root, &root).map_err(TrustAnchorError::SelfSignature)?;
        Ok(Self { root, root_der })
    }

    /// 指定時刻（UNIXエポックからの経過時間）で検証する。
    pub fn check_at(&self, quote: &TdxQuote, now: Duration) -> Result<(), PolicyViolation> {
        quote.verify_signature()?;

        if quote.certification_data_type != CERT_DATA_TYPE_QE_REPORT {
            return Err(PolicyViolation::UnsupportedCertificationData(
                quote.certification_data_type,
            ));
        }
        let qe = QeReportCertData::parse(&quote.certification_data)
            .map_err(|e| PolicyViolation::CertificationData(e.to_string()))?;
        if qe.pck_chain_type != CERT_DATA_TYPE_PCK_CHAIN {
            return Err(PolicyViolation::UnsupportedCertificationData(qe.pck_chain_type));
        }

        let pck = self
            .verify_chain(&qe.pck_chain, now)
            .map_err(PolicyViolation::CertChain)?;
        let pck_key = public_key(&pck).map_err(PolicyViolation::CertChain)?;
        let signature = Signature::from_slice(&qe.qe_report_signature)
            .map_err(|_| PolicyViolation::BadQeReportSignature)?;
        pck_key
            .verify(&qe.qe_report, &signature)
            .map_err(|_| PolicyViolation::BadQeReportSignature)?;

        let digest = Sha256::new()
            .chain_update(quote.attestation_key)
            .chain_update(&qe.qe_auth_data)
            .finalize();
        let (bound, padding) = qe.report_data().split_at(digest.len());
        if bound != digest.as_slice() || padding.iter().any(|&b| b != 0) {
            return Err(PolicyViolation::AttestationKeyNotBound);
        }
        Ok(())
    }

    /// PEMチェーンを検証し、リーフ（PCK証明書）を返す。
    ///
    /// チェーン末尾に同梱されたルートは固定ルートと同一の場合のみ読み飛ばす。
    fn verify_chain(&self, pem_chain: &[u8], now: Duration) -> Result<Certificate, String> {
        let mut ders: Vec<Vec<u8>> = pem::parse_many(pem_chain)
            .map_err(|e| format!("PEMのパースに失敗: {e}"))?
            .into_iter()
            .filter(|p| p.tag() == "CERTIFICATE")
            .map(pem::Pem::into_contents)
            .collect();
        while ders.last().is_some_and(|last| *last == self.root_der) {
            ders.pop();
        }

        let certs = ders
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                Certificate::from_der(bytes).map_err(|e| format!("証明書[{i}]のパースに失敗: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // 各ペア(child, parent)の署名を検証。最後の証明書の親は固定ルート
        for (i, cert) in certs.iter().enumerate() {
            let parent = certs.get(i + 1).unwrap_or(&self.root);
            verify_cert_signature(cert, parent)
                .map_err(|e| format!("証明書[{}]→[{}]の検証失敗: {}", i, i + 1, e))?;
            check_validity(cert, now).map_err(|e| format!("証明書[{i}]: {e}"))?;
        }
        check_validity(&self.root, now).map_err(|e| format!("ルート証明書: {e}"))?;

        certs
            .into_iter()
            .next()
            .ok_or_else(|| "PCK証明書がありません".to_string())
    }
}

impl TrustPolicy for PckChainPolicy {
    fn name(&self) -> &str {
        "pck-chain"
    }

    fn check(&self, quote: &TdxQuote) -> Result<(), PolicyViolation> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        self.check_at(quote, now)
    }
}

// ─────────────────────────────────────────────
// X.509ヘルパー
// ─────────────────────────────────────────────

fn public_key(cert: &Certificate) -> Result<VerifyingKey, String> {
    let bits = cert
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();
    VerifyingKey::from_sec1_bytes(bits).map_err(|e| format!("P-256公開鍵のパースに失敗: {e}"))
}

/// X.509証明書の署名を親証明書の公開鍵で検証する。
fn verify_cert_signature(child: &Certificate, parent: &Certificate) -> Result<(), String> {
    let verifying_key = public_key(parent)?;

    let tbs_der = child
        .tbs_certificate
        .to_der()
        .map_err(|e| format!("TBSCertificateのDERエンコードに失敗: {e}"))?;

    let der_sig = DerSignature::from_bytes(child.signature.raw_bytes())
        .map_err(|e| format!("ECDSA署名のデコードに失敗: {e}"))?;

    verifying_key
        .verify(&tbs_der, &der_sig)
        .map_err(|e| format!("署名検証に失敗: {e}"))
}

fn check_validity(cert: &Certificate, now: Duration) -> Result<(), String> {
    let validity = &cert.tbs_certificate.validity;
    if now < validity.not_before.to_unix_duration() {
        return Err("有効期間の開始前です".to_string());
    }
    if now > validity.not_after.to_unix_duration() {
        return Err("有効期限が切れています".to_string());
    }
    Ok(())
}
