//! # 集成连接处理器
//!
//! 解析请求并委托 `ConnectionService` 执行业务逻辑。
//! 回调以浏览器重定向收尾，携带粗粒度原因，绝不透传提供商原始报文

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::error::AppError;
use crate::integration::CallbackOutcome;
use crate::management::middleware::AuthContext;
use crate::management::{response, server::AppState};

/// 发起连接请求体
#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// 意图，当前仅支持 "connect"
    pub action: String,
}

/// 发起连接响应体
#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub url: String,
}

/// 回调查询参数（RFC 6749 §4.1 重定向）
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// 发起授权流程
pub async fn initiate(
    State(state): State<AppState>,
    Extension(auth_context): Extension<Arc<AuthContext>>,
    Path(provider): Path<String>,
    Json(request): Json<ConnectRequest>,
) -> impl IntoResponse {
    if request.action != "connect" {
        return response::error(
            StatusCode::BAD_REQUEST,
            "INVALID_ACTION",
            "unsupported action",
        );
    }

    match state
        .connections()
        .initiate(auth_context.user_id, &provider)
        .await
    {
        Ok(url) => response::success(ConnectResponse { url }),
        Err(err) => {
            error!(provider, error = %err, "发起授权流程失败");
            response::app_error(&err)
        }
    }
}

/// 处理授权回调（浏览器重定向）
pub async fn callback(
    State(state): State<AppState>,
    Extension(auth_context): Extension<Arc<AuthContext>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    let settings_url = state.config().server.settings_url.clone();

    let outcome = state
        .connections()
        .callback(
            auth_context.user_id,
            &provider,
            query.code.as_deref(),
            query.error.as_deref(),
        )
        .await;

    let location = match outcome {
        Ok(CallbackOutcome::Connected) => format!("{settings_url}?connected={provider}"),
        Ok(CallbackOutcome::Declined { reason }) => format!("{settings_url}?error={reason}"),
        Err(err) => {
            error!(provider, error = %err, "授权回调处理失败");
            let reason = match &err {
                AppError::Integration(integration_err) => integration_err.coarse_reason(),
                _ => "internal_error",
            };
            format!("{settings_url}?error={reason}")
        }
    };

    Redirect::to(&location).into_response()
}

/// 查询连接状态
pub async fn status(
    State(state): State<AppState>,
    Extension(auth_context): Extension<Arc<AuthContext>>,
    Path(provider): Path<String>,
) -> impl IntoResponse {
    match state
        .connections()
        .status(auth_context.user_id, &provider)
        .await
    {
        Ok(status) => response::success(status),
        Err(err) => {
            error!(provider, error = %err, "查询连接状态失败");
            response::app_error(&err)
        }
    }
}

/// 断开连接（幂等）
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(auth_context): Extension<Arc<AuthContext>>,
    Path(provider): Path<String>,
) -> impl IntoResponse {
    match state
        .connections()
        .disconnect(auth_context.user_id, &provider)
        .await
    {
        Ok(()) => response::success(json!({ "success": true })),
        Err(err) => {
            error!(provider, error = %err, "断开连接失败");
            response::app_error(&err)
        }
    }
}

/// 提供商目录 + 连接状态概览
pub async fn overview(
    State(state): State<AppState>,
    Extension(auth_context): Extension<Arc<AuthContext>>,
) -> impl IntoResponse {
    match state.connections().overview(auth_context.user_id).await {
        Ok(summaries) => response::success(summaries),
        Err(err) => {
            error!(error = %err, "查询集成概览失败");
            response::app_error(&err)
        }
    }
}
