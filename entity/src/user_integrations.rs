//! # 用户集成实体定义
//!
//! 用户与第三方提供商之间连接记录的 Sea-ORM 实体模型
//! 每个 (user_id, provider) 组合最多存在一行，令牌字段存储密文

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户集成记录实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "user_integrations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub provider: String,
    /// 访问令牌密文（AES-256-GCM）
    pub access_token: String,
    /// 刷新令牌密文，提供商未返回时为空
    pub refresh_token: Option<String>,
    /// 访问令牌过期时间，提供商未返回有效期时为空
    pub expires_at: Option<DateTime>,
    /// 实际授予的作用域（空格分隔）
    pub scopes: String,
    /// 提供商元数据（不透明 JSON）
    pub metadata: Option<Json>,
    pub status: String, // active, error, disconnected
    pub error_message: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Default for Model {
    fn default() -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: 0,
            user_id: 0,
            provider: String::new(),
            access_token: String::new(),
            refresh_token: None,
            expires_at: None,
            scopes: String::new(),
            metadata: None,
            status: "active".to_string(),
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 集成记录辅助方法
impl Model {
    /// 检查记录是否处于活跃状态
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    /// 检查访问令牌是否已过期（无过期时间视为未过期）
    pub fn token_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|at| chrono::Utc::now().naive_utc() > at)
    }
}
