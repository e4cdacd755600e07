//! # ネイティブ検証
//!
//! Quoteをプロセス内でデコードし、[`TrustPolicy`] に照らして判定する。
//! デコード失敗は `Malformed`、ポリシー違反は `Rejected`。

use crate::attestation::{TdxQuote, TrustPolicy};
use crate::verdict::Verdict;

use super::{EvidenceVerifier, VerifierError};

/// TDX Quoteをデコードしてポリシー検証する [`EvidenceVerifier`]。
#[derive(Debug, Clone)]
pub struct ParsedQuoteVerifier<P> {
    policy: P,
}

impl<P: TrustPolicy> ParsedQuoteVerifier<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    /// 同期的に判定する。I/Oを伴わない。
    pub fn evaluate(&self, raw: &[u8]) -> Verdict {
        let quote = match TdxQuote::parse(raw) {
            Ok(q) => q,
            Err(e) => return Verdict::Malformed(format!("Failed to parse TDX quote: {e}")),
        };

        if let Err(violation) = self.policy.check(&quote) {
            return Verdict::Rejected(format!("TDX quote verification failed: {violation}"));
        }

        tracing::info!(
            policy = self.policy.name(),
            mr_td = %hex::encode(quote.td_report.mr_td),
            report_data = %hex::encode(quote.td_report.report_data),
            "TDX Quoteを検証しました"
        );
        Verdict::Verified(format!("TDX quote verified ({})", self.policy.name()))
    }
}

#[async_trait::async_trait]
impl<P: TrustPolicy> EvidenceVerifier for ParsedQuoteVerifier<P> {
    fn name(&self) -> &str {
        "native"
    }

    async fn verify(&self, raw: &[u8]) -> Result<Verdict, VerifierError> {
        Ok(self.evaluate(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::pck::tests::TestPki;
    use crate::attestation::tdx::tests::build_quote;
    use crate::attestation::tdx::HEADER_SIZE;
    use crate::attestation::{PckChainPolicy, PolicyViolation};
    use p256::ecdsa::SigningKey;

    /// 常に同じ違反を返すポリシー
    struct DenyAll;

    impl TrustPolicy for DenyAll {
        fn name(&self) -> &str {
            "deny-all"
        }

        fn check(&self, _quote: &TdxQuote) -> Result<(), PolicyViolation> {
            Err(PolicyViolation::Other("TCB status OutOfDate".to_string()))
        }
    }

    #[tokio::test]
    async fn test_native_verified() {
        let pki = TestPki::new();
        let verifier = ParsedQuoteVerifier::new(pki.policy());
        let verdict = verifier.verify(&pki.quote([9u8; 64])).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Verified("TDX quote verified (pck-chain)".to_string())
        );
    }

    /// 自前の鍵で署名しただけのQuoteはVerifiedにならないことを確認
    #[tokio::test]
    async fn test_native_self_signed_quote_rejected() {
        let attacker = SigningKey::random(&mut rand::rngs::OsRng);
        let raw = build_quote(&attacker, [0u8; 64], b"garbage, not a certificate chain");

        let verifier = ParsedQuoteVerifier::new(PckChainPolicy::intel().unwrap());
        let verdict = verifier.verify(&raw).await.unwrap();
        match verdict {
            Verdict::Rejected(msg) => {
                assert!(msg.starts_with("TDX quote verification failed: "), "{msg}")
            }
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    /// 4バイトのみのversion 4 QuoteはMalformedになることを確認
    #[tokio::test]
    async fn test_native_malformed() {
        let verifier = ParsedQuoteVerifier::new(TestPki::new().policy());
        let verdict = verifier.verify(&[4, 0, 2, 0]).await.unwrap();
        match verdict {
            Verdict::Malformed(msg) => assert!(msg.starts_with("Failed to parse TDX quote: ")),
            other => panic!("unexpected verdict: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_native_rejected_by_signature() {
        let pki = TestPki::new();
        let mut raw = pki.quote([9u8; 64]);
        raw[HEADER_SIZE + 520] ^= 0x01; // REPORTDATA
        let verifier = ParsedQuoteVerifier::new(pki.policy());
        let verdict = verifier.verify(&raw).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Rejected("TDX quote verification failed: Quote署名の検証に失敗".to_string())
        );
    }

    #[tokio::test]
    async fn test_native_rejected_by_policy() {
        let verifier = ParsedQuoteVerifier::new(DenyAll);
        let verdict = verifier.verify(&TestPki::new().quote([9u8; 64])).await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Rejected("TDX quote verification failed: TCB status OutOfDate".to_string())
        );
    }
}
