//! # 连接生命周期服务
//!
//! 编排完整的连接生命周期（发起、回调、状态查询、断开），
//! 组合注册表、PKCE、协议客户端、令牌加密、元数据获取与持久化。
//!
//! 状态机（外部通过status可见）：
//! `not_connected`（无记录）→ `active` → `error`（记录存在但上次操作失败）
//! → 断开后记录删除，等价于 `not_connected`

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{debug, warn};

use super::crypto::TokenCipher;
use super::metadata::MetadataFetcherSet;
use super::oauth_client::OAuthClient;
use super::pending::PendingAuthorizations;
use super::pkce::{PkcePair, PkceVerifier};
use super::registry::ProviderRegistry;
use super::store::{IntegrationStore, UpsertIntegration};
use crate::error::{IntegrationError, Result};

/// 回调处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// 连接成功建立
    Connected,
    /// 用户在提供商侧拒绝或取消授权，存储未被触碰
    Declined { reason: String },
}

/// 连接状态查询结果
#[derive(Debug, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<chrono::NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub status: String,
}

/// 提供商目录条目 + 当前用户连接状态
#[derive(Debug, Serialize)]
pub struct ProviderSummary {
    pub provider: String,
    pub display_name: String,
    pub scopes: Vec<String>,
    pub connected: bool,
    pub status: String,
}

/// 连接生命周期服务
pub struct ConnectionService {
    registry: Arc<ProviderRegistry>,
    store: IntegrationStore,
    oauth_client: OAuthClient,
    cipher: Arc<TokenCipher>,
    pending: PendingAuthorizations,
    metadata_fetchers: MetadataFetcherSet,
}

impl ConnectionService {
    /// 创建新的连接服务
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        registry: Arc<ProviderRegistry>,
        cipher: Arc<TokenCipher>,
        metadata_fetchers: MetadataFetcherSet,
    ) -> Self {
        Self {
            registry,
            store: IntegrationStore::new(db),
            oauth_client: OAuthClient::new(),
            cipher,
            pending: PendingAuthorizations::new(),
            metadata_fetchers,
        }
    }

    /// 发起授权流程
    ///
    /// 解析配置、生成PKCE参数对、将验证器写入短期存储（10分钟、单次使用），
    /// 返回授权URL。验证器本身绝不出现在返回值或日志中
    pub async fn initiate(&self, user_id: i32, provider: &str) -> Result<String> {
        let config = self.registry.resolve_config(provider)?;

        let pkce = PkcePair::generate();
        let authorize_url = OAuthClient::build_authorize_url(&config, &pkce)?;

        self.pending
            .put(user_id, provider, pkce.verifier.into_string())
            .await;

        debug!(user_id, provider, "已发起授权流程");
        Ok(authorize_url)
    }

    /// 处理授权回调
    ///
    /// 提供商返回error时直接返回拒绝结果，不触碰存储；
    /// 验证器缺失（过期/重放/伪造）是终态失败；
    /// 换取令牌成功后加密存储，元数据获取尽力而为；
    /// 已有active记录时的后续失败将其置为error而非删除
    pub async fn callback(
        &self,
        user_id: i32,
        provider: &str,
        code: Option<&str>,
        error: Option<&str>,
    ) -> Result<CallbackOutcome> {
        // 无论结果如何都消费掉待处理验证器（回调只有一次机会）
        let verifier = self.pending.take(user_id, provider).await;

        if let Some(error) = error {
            debug!(user_id, provider, error, "用户拒绝或提供商返回错误");
            return Ok(CallbackOutcome::Declined {
                reason: coarse_decline_reason(error).to_string(),
            });
        }

        // 取回的验证器必须仍满足RFC 7636格式，损坏的条目等同缺失
        let verifier = verifier
            .and_then(|v| PkceVerifier::from_string(v).ok())
            .ok_or_else(|| IntegrationError::MissingVerifier(provider.to_string()))?;

        let config = self.registry.resolve_config(provider)?;

        let code = code.ok_or_else(|| IntegrationError::TokenExchangeFailed {
            provider: provider.to_string(),
            detail: "authorization code missing from callback".to_string(),
        })?;

        let token_response = match self
            .oauth_client
            .exchange_code(&config, code, verifier.as_str())
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                // 先前的active记录转为error状态，保留审计历史
                self.store
                    .mark_error(user_id, provider, err.coarse_reason())
                    .await?;
                return Err(err.into());
            }
        };

        let access_token_ciphertext = self.cipher.encrypt(&token_response.access_token)?;
        let refresh_token_ciphertext = token_response
            .refresh_token
            .as_deref()
            .map(|t| self.cipher.encrypt(t))
            .transpose()?;

        let expires_at = token_response
            .expires_in
            .map(|secs| Utc::now().naive_utc() + Duration::seconds(secs));

        // 记录实际授予的作用域，可能与请求的不同
        let scopes = token_response
            .scope
            .clone()
            .unwrap_or_else(|| config.scope_string());

        // 尽力而为：元数据获取失败只记录日志，连接本身已经成功
        let metadata = match self.metadata_fetchers.get(provider) {
            Some(fetcher) => match fetcher.fetch(&token_response.access_token).await {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(user_id, provider, error = %err, "元数据获取失败，留空继续");
                    None
                }
            },
            None => None,
        };

        self.store
            .upsert(UpsertIntegration {
                user_id,
                provider: provider.to_string(),
                access_token: access_token_ciphertext,
                refresh_token: refresh_token_ciphertext,
                expires_at,
                scopes,
                metadata,
            })
            .await?;

        debug!(user_id, provider, "连接建立成功");
        Ok(CallbackOutcome::Connected)
    }

    /// 查询连接状态
    ///
    /// 无记录返回 `connected=false`（不是错误）；
    /// 未知slug返回 `UnknownIntegration`（调用方缺陷，不是用户状态）
    pub async fn status(&self, user_id: i32, provider: &str) -> Result<ConnectionStatus> {
        if self.registry.get(provider).is_none() {
            return Err(IntegrationError::UnknownIntegration(provider.to_string()).into());
        }

        let record = self.store.get(user_id, provider).await?;

        Ok(match record {
            Some(record) => ConnectionStatus {
                connected: record.is_active(),
                connected_at: Some(record.created_at),
                metadata: record.metadata,
                status: record.status,
            },
            None => ConnectionStatus {
                connected: false,
                connected_at: None,
                metadata: None,
                status: "not_connected".to_string(),
            },
        })
    }

    /// 断开连接
    ///
    /// 幂等：记录不存在同样成功。不调用提供商的撤销端点
    pub async fn disconnect(&self, user_id: i32, provider: &str) -> Result<()> {
        if self.registry.get(provider).is_none() {
            return Err(IntegrationError::UnknownIntegration(provider.to_string()).into());
        }

        self.store.delete(user_id, provider).await?;
        debug!(user_id, provider, "连接已断开");
        Ok(())
    }

    /// 提供商目录 + 当前用户的连接状态概览
    pub async fn overview(&self, user_id: i32) -> Result<Vec<ProviderSummary>> {
        let mut summaries = Vec::new();

        for def in self.registry.all() {
            let record = self.store.get(user_id, &def.slug).await?;
            let (connected, status) = match &record {
                Some(record) => (record.is_active(), record.status.clone()),
                None => (false, "not_connected".to_string()),
            };

            summaries.push(ProviderSummary {
                provider: def.slug.clone(),
                display_name: def.display_name.clone(),
                scopes: def.scopes.clone(),
                connected,
                status,
            });
        }

        Ok(summaries)
    }

    /// 解密已存储的访问令牌（供需要调用提供商API的协作方使用）
    ///
    /// 仅active且未过期的令牌对外提供
    pub async fn access_token(&self, user_id: i32, provider: &str) -> Result<Option<String>> {
        let Some(record) = self.store.get(user_id, provider).await? else {
            return Ok(None);
        };

        if !record.is_active() || record.token_expired() {
            return Ok(None);
        }

        let token = self.cipher.decrypt(&record.access_token)?;
        Ok(Some(token))
    }
}

/// 提供商侧错误码映射为粗粒度拒绝原因
fn coarse_decline_reason(provider_error: &str) -> &'static str {
    match provider_error {
        "access_denied" => "access_denied",
        _ => "provider_error",
    }
}
