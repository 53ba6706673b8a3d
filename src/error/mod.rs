//! The unified error handling system for the application.

use axum::http::StatusCode;
use thiserror::Error;

pub mod integration;

pub use integration::IntegrationError;

/// A unified `Result` type for the entire application.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, AppError>;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 认证和授权错误
    #[error("认证错误: {message}")]
    Authentication { message: String },

    /// 集成生命周期错误
    #[error("集成错误: {0}")]
    Integration(#[from] IntegrationError),

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl AppError {
    /// 创建配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建数据库错误
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    /// 创建认证错误
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 映射为 HTTP 状态码
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Integration(err) => match err {
                IntegrationError::UnknownIntegration(_) => StatusCode::NOT_FOUND,
                IntegrationError::MissingVerifier(_) => StatusCode::BAD_REQUEST,
                IntegrationError::TokenExchangeFailed { .. } => StatusCode::BAD_GATEWAY,
                IntegrationError::MissingCredential { .. }
                | IntegrationError::MetadataFetchFailed { .. }
                | IntegrationError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Config { .. } | Self::Database { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 机器可读的错误代码
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Authentication { .. } => "UNAUTHORIZED",
            Self::Integration(err) => match err {
                IntegrationError::UnknownIntegration(_) => "UNKNOWN_INTEGRATION",
                IntegrationError::MissingCredential { .. } => "MISSING_CREDENTIAL",
                IntegrationError::MissingVerifier(_) => "MISSING_VERIFIER",
                IntegrationError::TokenExchangeFailed { .. } => "TOKEN_EXCHANGE_FAILED",
                IntegrationError::MetadataFetchFailed { .. } => "METADATA_FETCH_FAILED",
                IntegrationError::Storage(_) => "STORAGE_ERROR",
            },
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Integration(IntegrationError::Storage(err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("配置文件解析失败", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        let err = AppError::from(IntegrationError::UnknownIntegration("x".to_string()));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "UNKNOWN_INTEGRATION");

        let err = AppError::authentication("no token");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = AppError::from(IntegrationError::TokenExchangeFailed {
            provider: "dub".to_string(),
            detail: "timeout".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
