//! # 検証結果
//!
//! Quote検証の結果は3値で、それぞれ信頼上の意味が異なる。
//!
//! | 判定 | 意味 |
//! |------|------|
//! | `Verified` | 署名と証明書（またはAttestation）チェーンが検証ポリシーを満たした |
//! | `Rejected` | チェーンを検証した上で失敗した |
//! | `Malformed` | 構造として解釈できず、検証は行っていない |

/// Quote検証の判定。いずれも人間向けの説明を持つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Verified(String),
    Rejected(String),
    Malformed(String),
}

impl Verdict {
    /// ログ表示用の短い名前。
    pub fn kind(&self) -> &'static str {
        match self {
            Verdict::Verified(_) => "verified",
            Verdict::Rejected(_) => "rejected",
            Verdict::Malformed(_) => "malformed",
        }
    }
}
