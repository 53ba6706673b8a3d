//! # Integration Hub 主程序
//!
//! 第三方账号集成服务 - OAuth2/PKCE授权与连接生命周期管理

use std::sync::Arc;

use integration_hub::{
    Result,
    config::load_config,
    database, logging,
    management::{AppContext, ManagementServer},
};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志系统
    logging::init_logging(None);

    info!("🚀 开始初始化...");

    // 加载配置
    let config = load_config()?;

    // 初始化数据库并执行迁移
    let db = database::init_database(&config.database.url)
        .await
        .map_err(|e| integration_hub::AppError::Database {
            message: format!("数据库连接失败: {e}"),
            source: Some(e.into()),
        })?;

    info!("📋 执行数据库迁移...");
    database::run_migrations(&db)
        .await
        .map_err(|e| integration_hub::AppError::Database {
            message: format!("数据库迁移失败: {e}"),
            source: Some(e.into()),
        })?;

    // 构建应用上下文（令牌加密密钥在此处快速失败）
    let context = Arc::new(AppContext::new(config, db)?);

    info!("服务启动");
    if let Err(e) = ManagementServer::new(context).run().await {
        error!("服务启动失败: {e:?}");
        std::process::exit(1);
    }

    info!("服务正常关闭");
    Ok(())
}
