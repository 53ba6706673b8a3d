//! # OAuth2/PKCE 集成框架
//!
//! 提供商注册表、配置解析、PKCE生成、授权/令牌交换协议客户端、
//! 令牌静态加密、连接记录持久化与生命周期状态机

pub mod crypto;
pub mod metadata;
pub mod oauth_client;
pub mod pending;
pub mod pkce;
pub mod registry;
pub mod service;
pub mod store;

pub use crypto::TokenCipher;
pub use metadata::{MetadataFetcher, MetadataFetcherSet};
pub use oauth_client::{OAuthClient, TokenResponse};
pub use pending::PendingAuthorizations;
pub use pkce::{PkcePair, PkceVerifier};
pub use registry::{ProviderConfig, ProviderDefinition, ProviderRegistry};
pub use service::{CallbackOutcome, ConnectionService, ConnectionStatus};
pub use store::{IntegrationStatus, IntegrationStore};
