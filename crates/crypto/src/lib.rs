//! # Attest Gateway 鍵・APIキー
//!
//! Gatewayのエンドポイントを保護するスコープ付きAPIキーの発行と検証。
//!
//! ## 暗号アルゴリズム
//! | 用途 | アルゴリズム |
//! |------|------------|
//! | APIキー署名 | Ed25519 (JWT `alg: EdDSA` 固定) |
//! | 鍵ファイル | PKCS#8 PEM |
//!
//! ## 構成
//! - [`keys`]: 起動時に一度だけ構築する不変の鍵マテリアル
//! - [`credential`]: APIキーの発行（[`CredentialIssuer`]）と検証（[`CredentialValidator`]）

pub mod credential;
pub mod keys;

pub use credential::{
    scope_grants, AuthFailure, Credential, CredentialError, CredentialIssuer, CredentialValidator,
    IssuedCredential,
};
pub use keys::{KeyError, KeyMaterial};
