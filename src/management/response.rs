//! # API 响应结构
//!
//! 定义了标准的 JSON API 响应格式，包括成功和失败响应

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;

/// # 标准成功响应
#[derive(Debug, Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: DateTime<Utc>,
}

/// # 标准错误信息
#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

/// # 标准错误响应
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorInfo,
    pub timestamp: DateTime<Utc>,
}

/// 成功响应
pub fn success<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(SuccessResponse {
            success: true,
            data: Some(data),
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

/// 应用错误响应
///
/// 对浏览器仅暴露错误代码与粗粒度消息，内部细节只进日志
pub fn app_error(err: &AppError) -> Response {
    let message = match err {
        AppError::Integration(integration_err) => integration_err.coarse_reason().to_string(),
        other => other.error_code().to_lowercase(),
    };

    (
        err.status_code(),
        Json(ErrorResponse {
            success: false,
            error: ErrorInfo {
                code: err.error_code().to_string(),
                message,
            },
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}

/// 通用错误响应
pub fn error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: ErrorInfo {
                code: code.to_string(),
                message: message.to_string(),
            },
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}
