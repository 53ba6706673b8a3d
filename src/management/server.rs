//! # 管理服务器
//!
//! Axum HTTP服务器，提供集成连接API

use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::integration::{ConnectionService, MetadataFetcherSet, ProviderRegistry, TokenCipher};
use crate::management::middleware::JwtValidator;
use crate::management::routes;

/// 应用上下文（进程级共享状态）
pub struct AppContext {
    config: AppConfig,
    connections: ConnectionService,
    jwt_validator: JwtValidator,
}

impl AppContext {
    /// 构建应用上下文
    ///
    /// 启动时快速失败：令牌加密密钥无效即报错，绝不带空密钥运行
    pub fn new(config: AppConfig, db: DatabaseConnection) -> Result<Self> {
        let cipher = Arc::new(TokenCipher::from_env()?);
        let registry = Arc::clone(ProviderRegistry::global());
        let jwt_validator = JwtValidator::new(&config.auth.jwt_secret);

        let connections =
            ConnectionService::new(db, registry, cipher, MetadataFetcherSet::builtin());

        Ok(Self {
            config,
            connections,
            jwt_validator,
        })
    }
}

/// 管理服务器应用状态
#[derive(Clone)]
pub struct AppState {
    context: Arc<AppContext>,
}

impl AppState {
    #[must_use]
    pub const fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// 应用配置
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.context.config
    }

    /// 连接生命周期服务
    #[must_use]
    pub fn connections(&self) -> &ConnectionService {
        &self.context.connections
    }

    /// JWT验证器
    #[must_use]
    pub fn jwt_validator(&self) -> &JwtValidator {
        &self.context.jwt_validator
    }
}

impl Deref for AppState {
    type Target = AppContext;

    fn deref(&self) -> &Self::Target {
        &self.context
    }
}

/// 管理服务器
pub struct ManagementServer {
    config: AppConfig,
    router: Router,
}

impl ManagementServer {
    /// 创建新的管理服务器
    pub fn new(context: Arc<AppContext>) -> Self {
        let config = context.config.clone();
        let state = AppState::new(context);
        let router = Self::create_router(state, &config);

        Self { config, router }
    }

    /// 创建路由器
    fn create_router(state: AppState, config: &AppConfig) -> Router {
        let mut router = routes::create_routes(state).layer(TraceLayer::new_for_http());

        if config.server.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            );
        }

        router
    }

    /// 启动服务器
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.server.host, self.config.server.port)
            .parse()
            .map_err(|e| {
                AppError::config_with_source("无效的监听地址", anyhow::anyhow!("{e}"))
            })?;

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            AppError::internal_with_source(format!("无法绑定监听地址 {addr}"), e)
        })?;

        info!("管理服务器监听于 {addr}");

        axum::serve(listener, self.router)
            .await
            .map_err(|e| AppError::internal_with_source("服务器运行失败", e))
    }
}
