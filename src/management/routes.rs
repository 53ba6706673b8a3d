//! # 路由配置
//!
//! 定义所有API路由和路由组织

use axum::Router;
use axum::middleware;
use axum::routing::get;

use crate::management::handlers::integrations;
use crate::management::middleware::auth_middleware;
use crate::management::server::AppState;

/// 创建所有路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/integrations", integration_routes(state.clone()))
        .with_state(state)
}

/// 集成连接路由（全部要求认证）
fn integration_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(integrations::overview))
        .route(
            "/{provider}",
            get(integrations::status)
                .post(integrations::initiate)
                .delete(integrations::disconnect),
        )
        .route("/{provider}/callback", get(integrations::callback))
        .layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// 健康检查
async fn health_check() -> &'static str {
    "ok"
}
