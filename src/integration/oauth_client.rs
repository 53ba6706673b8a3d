//! # OAuth 2.0 协议客户端
//!
//! 构建授权重定向URL（纯构造，无网络I/O）并执行授权码到访问令牌的交换。
//! 令牌交换是用户请求路径上的第三方网络调用，超时有界（10秒），
//! 提供商原始错误报文只进入错误detail用于诊断，绝不进入日志中的敏感字段。

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use super::pkce::{CHALLENGE_METHOD, PkcePair};
use super::registry::ProviderConfig;
use crate::error::IntegrationError;

/// 令牌交换超时
const TOKEN_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// 令牌响应结构（来自OAuth服务器的原始响应）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// 实际授予的作用域（可能与请求的不同）
    #[serde(default)]
    pub scope: Option<String>,
}

/// 错误响应结构（RFC 6749 §5.2）
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth协议客户端
#[derive(Debug, Clone)]
pub struct OAuthClient {
    http_client: reqwest::Client,
}

impl OAuthClient {
    /// 创建新的协议客户端
    #[must_use]
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(TOKEN_EXCHANGE_TIMEOUT)
            .user_agent("integration-hub/0.1")
            .build()
            .unwrap_or_default();

        Self {
            http_client: client,
        }
    }

    /// 构建授权重定向URL
    ///
    /// 纯构造：`client_id`、`redirect_uri`、`response_type=code`、
    /// `scope`（空格连接）、PKCE参数及提供商特定额外参数
    pub fn build_authorize_url(
        config: &ProviderConfig,
        pkce: &PkcePair,
    ) -> Result<String, IntegrationError> {
        let mut url = Url::parse(&config.authorize_url).map_err(|e| {
            IntegrationError::TokenExchangeFailed {
                provider: config.slug.clone(),
                detail: format!("invalid authorize URL: {e}"),
            }
        })?;

        let scope = config.scope_string();
        let mut params = vec![
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", &scope),
        ];

        if config.pkce_required {
            params.push(("code_challenge", pkce.challenge.as_str()));
            params.push(("code_challenge_method", CHALLENGE_METHOD));
        }

        let extra_params: Vec<(&str, &str)> = config
            .extra_authorize_params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        params.extend(extra_params);

        url.query_pairs_mut().extend_pairs(params);

        Ok(url.to_string())
    }

    /// 交换授权码获取访问令牌
    ///
    /// 同步阻塞当前请求直至提供商响应或超时；任何非2xx响应或
    /// 格式错误的JSON均返回 `TokenExchangeFailed`
    pub async fn exchange_code(
        &self,
        config: &ProviderConfig,
        authorization_code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, IntegrationError> {
        // 提取真正的authorization code（移除fragment部分）
        let actual_code = authorization_code
            .split('#')
            .next()
            .unwrap_or(authorization_code);

        let mut form_params = HashMap::new();
        form_params.insert("grant_type", "authorization_code");
        form_params.insert("code", actual_code);
        form_params.insert("redirect_uri", config.redirect_uri.as_str());
        form_params.insert("client_id", config.client_id.as_str());
        form_params.insert("client_secret", config.client_secret.as_str());
        form_params.insert("code_verifier", code_verifier);

        let response = self
            .http_client
            .post(&config.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .form(&form_params)
            .send()
            .await
            .map_err(|e| IntegrationError::TokenExchangeFailed {
                provider: config.slug.clone(),
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            // 尝试解析标准错误响应，保留原始报文用于诊断
            if let Ok(error_response) = serde_json::from_str::<TokenErrorResponse>(&error_text)
                && let Some(error) = error_response.error
            {
                return Err(IntegrationError::TokenExchangeFailed {
                    provider: config.slug.clone(),
                    detail: format!(
                        "{error}: {}",
                        error_response.error_description.unwrap_or_default()
                    ),
                });
            }
            return Err(IntegrationError::TokenExchangeFailed {
                provider: config.slug.clone(),
                detail: format!("HTTP {status}: {error_text}"),
            });
        }

        let data =
            response
                .text()
                .await
                .map_err(|e| IntegrationError::TokenExchangeFailed {
                    provider: config.slug.clone(),
                    detail: format!("failed to read response body: {e}"),
                })?;

        let token_response = serde_json::from_str::<TokenResponse>(&data).map_err(|e| {
            IntegrationError::TokenExchangeFailed {
                provider: config.slug.clone(),
                detail: format!("malformed token response: {e}"),
            }
        })?;

        tracing::debug!(
            provider = %config.slug,
            expires_in = ?token_response.expires_in,
            has_refresh_token = token_response.refresh_token.is_some(),
            granted_scope = ?token_response.scope,
            "令牌交换成功"
        );

        Ok(token_response)
    }
}

impl Default for OAuthClient {
    fn default() -> Self {
        Self::new()
    }
}
