//! # 提供商元数据获取
//!
//! 授权成功后的按提供商增强调用：用新鲜的访问令牌获取少量描述性
//! 元数据（工作区身份、账户信息）。尽力而为——此处的失败绝不导致
//! 整体连接失败，调用方吞掉错误并记录日志，metadata字段留空。
//!
//! 按slug多态分发：启动时解析一次为查找表，不做运行时反射。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::IntegrationError;

/// 元数据调用超时
const METADATA_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// 提供商元数据获取策略
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// 对应的提供商slug
    fn slug(&self) -> &'static str;

    /// 获取描述性元数据（不透明JSON）
    async fn fetch(&self, access_token: &str) -> Result<serde_json::Value, IntegrationError>;
}

/// Dub元数据获取器：默认工作区身份
pub struct DubMetadataFetcher {
    http_client: reqwest::Client,
    base_url: String,
}

impl DubMetadataFetcher {
    /// 创建指向生产API的获取器
    #[must_use]
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_base_url(http_client, "https://api.dub.co")
    }

    /// 创建指向指定基础URL的获取器
    #[must_use]
    pub fn with_base_url(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MetadataFetcher for DubMetadataFetcher {
    fn slug(&self) -> &'static str {
        "dub"
    }

    async fn fetch(&self, access_token: &str) -> Result<serde_json::Value, IntegrationError> {
        let url = format!("{}/workspaces", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IntegrationError::MetadataFetchFailed {
                provider: "dub".to_string(),
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntegrationError::MetadataFetchFailed {
                provider: "dub".to_string(),
                detail: format!("HTTP {status}"),
            });
        }

        let workspaces: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| IntegrationError::MetadataFetchFailed {
                    provider: "dub".to_string(),
                    detail: format!("malformed response: {e}"),
                })?;

        // 取第一个工作区作为默认工作区
        let workspace = workspaces
            .as_array()
            .and_then(|list| list.first())
            .ok_or_else(|| IntegrationError::MetadataFetchFailed {
                provider: "dub".to_string(),
                detail: "no workspace available".to_string(),
            })?;

        Ok(json!({
            "workspace_id": workspace.get("id"),
            "workspace_name": workspace.get("name"),
            "workspace_slug": workspace.get("slug"),
        }))
    }
}

/// Dropbox元数据获取器：当前账户身份
pub struct DropboxMetadataFetcher {
    http_client: reqwest::Client,
    base_url: String,
}

impl DropboxMetadataFetcher {
    /// 创建指向生产API的获取器
    #[must_use]
    pub fn new(http_client: reqwest::Client) -> Self {
        Self::with_base_url(http_client, "https://api.dropboxapi.com")
    }

    /// 创建指向指定基础URL的获取器
    #[must_use]
    pub fn with_base_url(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl MetadataFetcher for DropboxMetadataFetcher {
    fn slug(&self) -> &'static str {
        "dropbox"
    }

    async fn fetch(&self, access_token: &str) -> Result<serde_json::Value, IntegrationError> {
        let url = format!("{}/2/users/get_current_account", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| IntegrationError::MetadataFetchFailed {
                provider: "dropbox".to_string(),
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntegrationError::MetadataFetchFailed {
                provider: "dropbox".to_string(),
                detail: format!("HTTP {status}"),
            });
        }

        let account: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| IntegrationError::MetadataFetchFailed {
                    provider: "dropbox".to_string(),
                    detail: format!("malformed response: {e}"),
                })?;

        Ok(json!({
            "account_id": account.get("account_id"),
            "email": account.get("email"),
            "name": account.pointer("/name/display_name"),
        }))
    }
}

/// 元数据获取器查找表（按slug，启动时解析一次）
pub struct MetadataFetcherSet {
    fetchers: HashMap<&'static str, Arc<dyn MetadataFetcher>>,
}

impl MetadataFetcherSet {
    /// 构建内置提供商的获取器集合
    #[must_use]
    pub fn builtin() -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(METADATA_FETCH_TIMEOUT)
            .user_agent("integration-hub/0.1")
            .build()
            .unwrap_or_default();

        Self::new(vec![
            Arc::new(DubMetadataFetcher::new(http_client.clone())),
            Arc::new(DropboxMetadataFetcher::new(http_client)),
        ])
    }

    /// 从给定获取器构建集合
    #[must_use]
    pub fn new(fetchers: Vec<Arc<dyn MetadataFetcher>>) -> Self {
        let fetchers = fetchers.into_iter().map(|f| (f.slug(), f)).collect();
        Self { fetchers }
    }

    /// 按slug查找获取器
    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&Arc<dyn MetadataFetcher>> {
        self.fetchers.get(slug)
    }
}
