//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义

pub mod user_integrations;

pub use user_integrations::Entity as UserIntegrations;
