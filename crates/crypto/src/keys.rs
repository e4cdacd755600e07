//! # 鍵マテリアル
//!
//! APIキーの署名・検証に使うEd25519キーペア。
//! 起動時に一度だけ構築し、以降は不変のまま `Arc` で Issuer / Validator に共有する。
//! 公開鍵は常に秘密鍵から導出する。

use std::fmt;
use std::path::Path;

use base64::Engine;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey, KeypairBytes};
use ed25519_dalek::{SigningKey, VerifyingKey};
use jsonwebtoken::{DecodingKey, EncodingKey};

/// 鍵マテリアル構築のエラー型。
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// 鍵ファイルを読み込めない
    #[error("鍵ファイルの読み込みに失敗 ({path}): {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// PEM/PKCS#8としてパースできない、またはEd25519鍵ではない
    #[error("Ed25519秘密鍵（PKCS#8 PEM）のパースに失敗: {0}")]
    Parse(String),
    /// JWT署名・検証鍵の構築に失敗
    #[error("JWT鍵の構築に失敗: {0}")]
    Jwt(String),
}

/// プロセス全体で1つだけ保持するEd25519キーペア。
///
/// 秘密鍵はJWTの署名鍵（[`EncodingKey`]）としてのみ保持し、外部には公開しない。
/// `Debug` 出力には公開鍵のみを含める。
pub struct KeyMaterial {
    verifying_key: VerifyingKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl KeyMaterial {
    /// Ed25519署名鍵から構築する。テストでは生成した鍵をそのまま渡す。
    pub fn from_signing_key(signing_key: &SigningKey) -> Result<Self, KeyError> {
        let verifying_key = signing_key.verifying_key();

        // PKCS#8 v1（公開鍵なし）で渡す
        let keypair = KeypairBytes {
            secret_key: signing_key.to_bytes(),
            public_key: None,
        };
        let der = keypair
            .to_pkcs8_der()
            .map_err(|e| KeyError::Jwt(format!("PKCS#8エンコードに失敗: {e}")))?;
        let encoding_key = EncodingKey::from_ed_der(der.as_bytes());

        let x = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(verifying_key.as_bytes());
        let decoding_key =
            DecodingKey::from_ed_components(&x).map_err(|e| KeyError::Jwt(e.to_string()))?;

        Ok(Self {
            verifying_key,
            encoding_key,
            decoding_key,
        })
    }

    /// PKCS#8 PEM文字列から構築する。
    ///
    /// `openssl genpkey -algorithm Ed25519` の出力をそのまま受け付ける。
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, KeyError> {
        let signing_key =
            SigningKey::from_pkcs8_pem(pem).map_err(|e| KeyError::Parse(e.to_string()))?;
        Self::from_signing_key(&signing_key)
    }

    /// PEMファイルから構築する。
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, KeyError> {
        let path = path.as_ref();
        let pem = std::fs::read_to_string(path).map_err(|source| KeyError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let keys = Self::from_pkcs8_pem(&pem)?;
        tracing::info!(
            key_file = %path.display(),
            public_key = %keys.public_key_hex(),
            "Ed25519署名鍵を読み込みました"
        );
        Ok(keys)
    }

    /// 検証用公開鍵。
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// 公開鍵の16進表記。
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("public_key", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
