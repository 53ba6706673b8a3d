//! # 令牌加密模块
//!
//! 令牌材料的静态加密（AES-256-GCM），每次加密使用新鲜随机数，
//! 相同明文的两次加密产出不同密文，存储层无法比较令牌相等性

use aes_gcm::{
    Aes256Gcm,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use base64::{Engine as _, engine::general_purpose};

use crate::error::{AppError, Result};

/// 密钥环境变量名（64个十六进制字符，即32字节）
const TOKEN_KEY_ENV: &str = "INTEGRATION_TOKEN_KEY";

/// 令牌加密器
pub struct TokenCipher {
    cipher: Aes256Gcm,
}

impl TokenCipher {
    /// 创建新的令牌加密器
    #[must_use]
    pub fn new(key: &[u8; 32]) -> Self {
        let key: [u8; 32] = *key;
        let key = key.into();
        let cipher = Aes256Gcm::new(&key);
        Self { cipher }
    }

    /// 从环境变量创建加密器
    ///
    /// 启动时快速失败：密钥缺失、非十六进制或长度不足32字节均报错
    pub fn from_env() -> Result<Self> {
        let key_str = std::env::var(TOKEN_KEY_ENV).map_err(|_| {
            AppError::config(format!("令牌加密密钥未配置（{TOKEN_KEY_ENV}）"))
        })?;

        if key_str.len() != 64 {
            return Err(AppError::config(
                "令牌加密密钥必须是64个字符的十六进制字符串（32字节）",
            ));
        }

        let key_bytes = hex::decode(&key_str)
            .map_err(|e| AppError::config_with_source("令牌加密密钥格式错误", e))?;

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);
        Ok(Self::new(&key))
    }

    /// 加密字符串，输出 `base64(nonce).base64(ciphertext)`
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| {
                AppError::internal_with_source(
                    "令牌加密失败",
                    anyhow::anyhow!("AES-GCM encryption failed: {e}"),
                )
            })?;

        Ok(format!(
            "{}.{}",
            general_purpose::STANDARD.encode(nonce),
            general_purpose::STANDARD.encode(&ciphertext)
        ))
    }

    /// 解密字符串
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let (nonce_part, data_part) = encoded
            .split_once('.')
            .ok_or_else(|| AppError::internal("密文格式错误：缺少随机数分隔符"))?;

        let nonce_bytes = general_purpose::STANDARD
            .decode(nonce_part)
            .map_err(|e| AppError::internal_with_source("加密随机数格式错误", e))?;

        let ciphertext = general_purpose::STANDARD
            .decode(data_part)
            .map_err(|e| AppError::internal_with_source("加密数据格式错误", e))?;

        let nonce_bytes: [u8; 12] = nonce_bytes
            .try_into()
            .map_err(|_| AppError::internal("加密随机数长度错误"))?;
        let nonce = nonce_bytes.into();

        let plaintext = self
            .cipher
            .decrypt(&nonce, ciphertext.as_ref())
            .map_err(|e| {
                AppError::internal_with_source(
                    "令牌解密失败",
                    anyhow::anyhow!("AES-GCM decryption failed: {e}"),
                )
            })?;

        String::from_utf8(plaintext)
            .map_err(|e| AppError::internal_with_source("解密后的数据不是有效的UTF-8字符串", e))
    }

    /// 生成新的加密密钥（运维工具）
    #[must_use]
    pub fn generate_key() -> String {
        use rand::RngCore;
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        hex::encode(key)
    }
}
