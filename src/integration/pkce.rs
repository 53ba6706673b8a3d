//! # PKCE (Proof Key for Code Exchange) 安全机制
//!
//! 实现RFC 7636定义的PKCE扩展，为授权码流程提供防拦截保护
//!
//! ## 核心原理
//! 1. 生成32字节随机数并base64url编码为Code Verifier（43字符）
//! 2. 通过SHA256哈希生成Code Challenge
//! 3. 授权请求时发送Code Challenge
//! 4. 令牌交换时发送Code Verifier进行验证

use base64::engine::{Engine, general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// PKCE Code Verifier长度范围（RFC 7636 §4.1）
const MIN_CODE_VERIFIER_LENGTH: usize = 43;
const MAX_CODE_VERIFIER_LENGTH: usize = 128;

/// Verifier熵源字节数，编码后恰好43字符
const VERIFIER_ENTROPY_BYTES: usize = 32;

/// Code Challenge方法，固定为S256
pub const CHALLENGE_METHOD: &str = "S256";

/// PKCE验证错误
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    #[error("Invalid code verifier length: {0}. Must be between {1} and {2}")]
    InvalidVerifierLength(usize, usize, usize),

    #[error("Invalid code verifier format: contains characters outside the unreserved set")]
    InvalidVerifierFormat,
}

/// PKCE Code Verifier
///
/// 密码学安全随机来源；绝不记录日志、绝不持久化到短期秘密存储之外
#[derive(Debug, Clone)]
pub struct PkceVerifier {
    value: String,
}

impl PkceVerifier {
    /// 生成新的Code Verifier（32字节熵，base64url编码）
    #[must_use]
    pub fn generate() -> Self {
        let mut entropy = [0u8; VERIFIER_ENTROPY_BYTES];
        OsRng.fill_bytes(&mut entropy);
        Self {
            value: URL_SAFE_NO_PAD.encode(entropy),
        }
    }

    /// 从现有字符串创建Code Verifier（回调侧取回时校验格式）
    pub fn from_string(value: String) -> Result<Self, PkceError> {
        Self::validate(&value)?;
        Ok(Self { value })
    }

    /// 获取字符串值
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// 获取字符串值（消费自身）
    #[must_use]
    pub fn into_string(self) -> String {
        self.value
    }

    /// 生成对应的Code Challenge
    #[must_use]
    pub fn challenge(&self) -> PkceChallenge {
        PkceChallenge::from_verifier(self)
    }

    /// 验证Code Verifier格式
    ///
    /// 字符集限定为 [A-Z] [a-z] [0-9] - . _ ~（RFC 3986 unreserved）
    fn validate(verifier: &str) -> Result<(), PkceError> {
        let len = verifier.len();
        if !(MIN_CODE_VERIFIER_LENGTH..=MAX_CODE_VERIFIER_LENGTH).contains(&len) {
            return Err(PkceError::InvalidVerifierLength(
                len,
                MIN_CODE_VERIFIER_LENGTH,
                MAX_CODE_VERIFIER_LENGTH,
            ));
        }

        if !verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
        {
            return Err(PkceError::InvalidVerifierFormat);
        }

        Ok(())
    }
}

/// PKCE Code Challenge
///
/// `challenge = base64url(SHA256(verifier))`，方法固定S256
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    value: String,
}

impl PkceChallenge {
    /// 从Code Verifier生成Code Challenge
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(verifier.as_str().as_bytes());
        let hash = hasher.finalize();
        Self {
            value: URL_SAFE_NO_PAD.encode(hash),
        }
    }

    /// 获取字符串值
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// 验证Code Verifier是否匹配此Challenge
    #[must_use]
    pub fn verify(&self, verifier: &PkceVerifier) -> bool {
        Self::from_verifier(verifier).value == self.value
    }
}

/// PKCE参数对
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: PkceVerifier,
    pub challenge: PkceChallenge,
}

impl PkcePair {
    /// 生成新的PKCE参数对
    #[must_use]
    pub fn generate() -> Self {
        let verifier = PkceVerifier::generate();
        let challenge = verifier.challenge();
        Self {
            verifier,
            challenge,
        }
    }
}

impl Default for PkcePair {
    fn default() -> Self {
        Self::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_length_and_charset() {
        let verifier = PkceVerifier::generate();
        assert_eq!(verifier.as_str().len(), 43);
        assert!(PkceVerifier::from_string(verifier.as_str().to_string()).is_ok());
    }

    #[test]
    fn test_challenge_is_base64url_sha256_of_verifier() {
        let verifier = PkceVerifier::generate();
        let challenge = verifier.challenge();

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_str().as_bytes());
        let expected = URL_SAFE_NO_PAD.encode(hasher.finalize());

        assert_eq!(challenge.as_str(), expected);
    }

    #[test]
    fn test_verifiers_do_not_repeat() {
        let a = PkceVerifier::generate();
        let b = PkceVerifier::generate();
        assert_ne!(a.as_str(), b.as_str());
    }

    #[test]
    fn test_challenge_verification() {
        let pair = PkcePair::generate();
        assert!(pair.challenge.verify(&pair.verifier));

        let other = PkceVerifier::generate();
        assert!(!pair.challenge.verify(&other));
    }

    #[test]
    fn test_invalid_verifier_rejected() {
        let result = PkceVerifier::from_string("short".to_string());
        assert!(matches!(
            result,
            Err(PkceError::InvalidVerifierLength(_, _, _))
        ));

        let result = PkceVerifier::from_string("!".repeat(50));
        assert!(matches!(result, Err(PkceError::InvalidVerifierFormat)));
    }
}
