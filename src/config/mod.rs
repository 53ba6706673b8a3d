//! # 配置管理模块
//!
//! 处理应用配置加载、验证和管理

mod app_config;

pub use app_config::{AppConfig, AuthConfig, DatabaseConfig, ServerConfig};

use std::env;
use std::path::Path;

/// 加载配置
///
/// 先读取 `config/config.{RUST_ENV}.toml`（不存在时使用默认值），
/// 再应用环境变量覆盖，最后验证有效性
pub fn load_config() -> crate::error::Result<AppConfig> {
    let run_env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
    let config_file = format!("config/config.{run_env}.toml");

    let mut config: AppConfig = if Path::new(&config_file).exists() {
        let config_content = std::fs::read_to_string(&config_file).map_err(|e| {
            crate::error::AppError::config_with_source(
                format!("读取配置文件失败: {config_file}"),
                e,
            )
        })?;
        toml::from_str(&config_content)?
    } else {
        AppConfig::default()
    };

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// 环境变量覆盖
fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(url) = env::var("DATABASE_URL") {
        config.database.url = url;
    }
    if let Ok(secret) = env::var("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Ok(port) = env::var("SERVER_PORT")
        && let Ok(port) = port.parse::<u16>()
    {
        config.server.port = port;
    }
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> crate::error::Result<()> {
    if config.server.port == 0 {
        return Err(crate::error::AppError::config(format!(
            "无效的服务器端口: {}",
            config.server.port
        )));
    }

    if config.database.url.trim().is_empty() {
        return Err(crate::error::AppError::config("数据库URL不能为空"));
    }

    if config.auth.jwt_secret.trim().is_empty() {
        return Err(crate::error::AppError::config(
            "JWT密钥未配置（JWT_SECRET 或 auth.jwt_secret）",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_empty_jwt_secret() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "test-secret".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
