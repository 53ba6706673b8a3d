//! Errors related to the OAuth 2.0 connection lifecycle.

use thiserror::Error;

/// The primary error type for all integration operations.
///
/// Each variant maps to one coarse, machine-readable reason that is safe
/// to surface to a browser. Raw provider payloads live only in the
/// `detail` fields and are logged server-side, never redirected.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// 提供商 slug 不在注册表中（调用方/配置缺陷）
    #[error("Unknown integration provider: {0}")]
    UnknownIntegration(String),

    /// 环境变量缺失或为空（部署配置错误）
    #[error("Missing credential for provider {provider}: environment variable {variable} is not set")]
    MissingCredential {
        provider: String,
        variable: String,
    },

    /// 回调时找不到待处理的验证器（过期、重放或伪造）
    #[error("No pending code verifier for provider {0}")]
    MissingVerifier(String),

    /// 令牌交换失败（提供商拒绝、网络错误或响应格式错误）
    #[error("Token exchange with {provider} failed: {detail}")]
    TokenExchangeFailed { provider: String, detail: String },

    /// 元数据获取失败（非致命，调用方吞掉并记录）
    #[error("Metadata fetch from {provider} failed: {detail}")]
    MetadataFetchFailed { provider: String, detail: String },

    /// 持久层错误
    #[error("Storage error: {0}")]
    Storage(#[from] sea_orm::DbErr),
}

impl IntegrationError {
    /// 面向浏览器的粗粒度失败原因，绝不携带提供商原始报文
    #[must_use]
    pub const fn coarse_reason(&self) -> &'static str {
        match self {
            Self::UnknownIntegration(_) => "unknown_provider",
            Self::MissingCredential { .. } => "provider_not_configured",
            Self::MissingVerifier(_) => "session_expired",
            Self::TokenExchangeFailed { .. } => "exchange_failed",
            Self::MetadataFetchFailed { .. } => "metadata_unavailable",
            Self::Storage(_) => "storage_error",
        }
    }
}
