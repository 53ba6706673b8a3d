//! # OAuth提供商注册表与配置解析
//!
//! 管理提供商定义的静态目录（slug、端点、作用域、环境变量键名），
//! 并在每次请求时将定义与环境变量中的凭据合并为完整配置。
//! 注册表在进程启动后只读，并发读取无需加锁。

use std::collections::HashMap;
use std::env;
use std::sync::{Arc, OnceLock};

use crate::error::IntegrationError;

/// 提供商凭据对应的环境变量键名
#[derive(Debug, Clone)]
pub struct EnvCredentialKeys {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// 提供商定义（进程级不可变目录条目）
#[derive(Debug, Clone)]
pub struct ProviderDefinition {
    /// 唯一标识（路径参数、存储键）
    pub slug: String,
    /// 展示名称
    pub display_name: String,
    /// 授权端点
    pub authorize_url: String,
    /// 令牌端点
    pub token_url: String,
    /// 请求的作用域（发送时以单个空格连接）
    pub scopes: Vec<String>,
    /// 是否要求PKCE（当前所有提供商均为true）
    pub pkce_required: bool,
    /// 凭据环境变量键名
    pub env: EnvCredentialKeys,
    /// 授权URL的提供商特定额外参数
    pub extra_authorize_params: Vec<(String, String)>,
}

/// 完整解析的提供商配置（定义 + 环境凭据）
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub slug: String,
    pub authorize_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
    pub pkce_required: bool,
    pub extra_authorize_params: Vec<(String, String)>,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl ProviderConfig {
    /// 请求作用域的线级表示（单空格连接）
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// OAuth提供商注册表
#[derive(Debug)]
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderDefinition>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<ProviderRegistry>> = OnceLock::new();

impl ProviderRegistry {
    /// 从给定定义构建注册表
    #[must_use]
    pub fn new(definitions: Vec<ProviderDefinition>) -> Self {
        let providers = definitions
            .into_iter()
            .map(|def| (def.slug.clone(), def))
            .collect();
        Self { providers }
    }

    /// 内置提供商目录
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(vec![dub_definition(), dropbox_definition()])
    }

    /// 进程级注册表（首次访问时构建，此后只读）
    pub fn global() -> &'static Arc<Self> {
        GLOBAL_REGISTRY.get_or_init(|| Arc::new(Self::builtin()))
    }

    /// 获取提供商定义
    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&ProviderDefinition> {
        self.providers.get(slug)
    }

    /// 遍历所有提供商定义（按slug排序，保证输出稳定）
    pub fn all(&self) -> impl Iterator<Item = &ProviderDefinition> {
        let mut defs: Vec<_> = self.providers.values().collect();
        defs.sort_by(|a, b| a.slug.cmp(&b.slug));
        defs.into_iter()
    }

    /// 解析提供商配置
    ///
    /// 失败关闭：注册表中不存在该slug返回 `UnknownIntegration`；
    /// 任一凭据环境变量缺失或为空返回 `MissingCredential`，
    /// 绝不产出带空密钥的配置
    pub fn resolve_config(&self, slug: &str) -> Result<ProviderConfig, IntegrationError> {
        let def = self
            .get(slug)
            .ok_or_else(|| IntegrationError::UnknownIntegration(slug.to_string()))?;

        let client_id = require_env(slug, &def.env.client_id)?;
        let client_secret = require_env(slug, &def.env.client_secret)?;
        let redirect_uri = require_env(slug, &def.env.redirect_uri)?;

        Ok(ProviderConfig {
            slug: def.slug.clone(),
            authorize_url: def.authorize_url.clone(),
            token_url: def.token_url.clone(),
            scopes: def.scopes.clone(),
            pkce_required: def.pkce_required,
            extra_authorize_params: def.extra_authorize_params.clone(),
            client_id,
            client_secret,
            redirect_uri,
        })
    }
}

/// 读取必填环境变量，空白值视为缺失
fn require_env(provider: &str, variable: &str) -> Result<String, IntegrationError> {
    match env::var(variable) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(IntegrationError::MissingCredential {
            provider: provider.to_string(),
            variable: variable.to_string(),
        }),
    }
}

/// Dub（短链服务）提供商定义
fn dub_definition() -> ProviderDefinition {
    ProviderDefinition {
        slug: "dub".to_string(),
        display_name: "Dub".to_string(),
        authorize_url: "https://app.dub.co/oauth/authorize".to_string(),
        token_url: "https://api.dub.co/oauth/token".to_string(),
        scopes: vec![
            "workspaces.read".to_string(),
            "links.read".to_string(),
            "links.write".to_string(),
        ],
        pkce_required: true,
        env: EnvCredentialKeys {
            client_id: "DUB_CLIENT_ID".to_string(),
            client_secret: "DUB_CLIENT_SECRET".to_string(),
            redirect_uri: "DUB_REDIRECT_URI".to_string(),
        },
        extra_authorize_params: vec![],
    }
}

/// Dropbox（云存储）提供商定义
fn dropbox_definition() -> ProviderDefinition {
    ProviderDefinition {
        slug: "dropbox".to_string(),
        display_name: "Dropbox".to_string(),
        authorize_url: "https://www.dropbox.com/oauth2/authorize".to_string(),
        token_url: "https://api.dropboxapi.com/oauth2/token".to_string(),
        scopes: vec![
            "account_info.read".to_string(),
            "files.metadata.read".to_string(),
        ],
        pkce_required: true,
        env: EnvCredentialKeys {
            client_id: "DROPBOX_CLIENT_ID".to_string(),
            client_secret: "DROPBOX_CLIENT_SECRET".to_string(),
            redirect_uri: "DROPBOX_REDIRECT_URI".to_string(),
        },
        // 请求离线访问以获得refresh_token
        extra_authorize_params: vec![("token_access_type".to_string(), "offline".to_string())],
    }
}
