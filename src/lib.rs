//! # Integration Hub System Library
//!
//! 第三方账号集成服务核心库：OAuth2/PKCE授权、令牌托管与连接生命周期管理

pub mod config;
pub mod database;
pub mod error;
pub mod integration;
pub mod logging;
pub mod management;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, IntegrationError, Result};
