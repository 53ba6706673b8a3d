//! # 集成记录存储
//!
//! `user_integrations` 表的CRUD，所有操作按 (user_id, provider) 限定，
//! 记录绝不跨用户返回。并发upsert依赖存储层自身的单行原子性

use chrono::Utc;
use entity::{UserIntegrations, user_integrations};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::error::IntegrationError;

/// 集成记录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationStatus {
    Active,
    Error,
    Disconnected,
}

impl IntegrationStatus {
    /// 转换为存储字符串
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for IntegrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// upsert参数
#[derive(Debug, Clone)]
pub struct UpsertIntegration {
    pub user_id: i32,
    pub provider: String,
    /// 密文
    pub access_token: String,
    /// 密文
    pub refresh_token: Option<String>,
    pub expires_at: Option<chrono::NaiveDateTime>,
    /// 实际授予的作用域（空格分隔）
    pub scopes: String,
    pub metadata: Option<serde_json::Value>,
}

/// 集成记录存储
#[derive(Debug, Clone)]
pub struct IntegrationStore {
    db: DatabaseConnection,
}

impl IntegrationStore {
    /// 创建新的存储
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 获取用户在指定提供商的集成记录
    pub async fn get(
        &self,
        user_id: i32,
        provider: &str,
    ) -> Result<Option<user_integrations::Model>, IntegrationError> {
        let record = UserIntegrations::find()
            .filter(user_integrations::Column::UserId.eq(user_id))
            .filter(user_integrations::Column::Provider.eq(provider))
            .one(&self.db)
            .await?;

        Ok(record)
    }

    /// 创建或更新集成记录
    ///
    /// 已存在 (user_id, provider) 行时原地更新（重连不产生重复行），
    /// 否则插入status=active的新行
    pub async fn upsert(
        &self,
        params: UpsertIntegration,
    ) -> Result<user_integrations::Model, IntegrationError> {
        let now = Utc::now().naive_utc();
        let existing = self.get(params.user_id, &params.provider).await?;

        let record = match existing {
            Some(record) => {
                let mut active_model: user_integrations::ActiveModel = record.into();
                active_model.access_token = Set(params.access_token);
                active_model.refresh_token = Set(params.refresh_token);
                active_model.expires_at = Set(params.expires_at);
                active_model.scopes = Set(params.scopes);
                active_model.metadata = Set(params.metadata);
                active_model.status = Set(IntegrationStatus::Active.as_str().to_string());
                active_model.error_message = Set(None);
                active_model.updated_at = Set(now);
                active_model.update(&self.db).await?
            }
            None => {
                let active_model = user_integrations::ActiveModel {
                    user_id: Set(params.user_id),
                    provider: Set(params.provider),
                    access_token: Set(params.access_token),
                    refresh_token: Set(params.refresh_token),
                    expires_at: Set(params.expires_at),
                    scopes: Set(params.scopes),
                    metadata: Set(params.metadata),
                    status: Set(IntegrationStatus::Active.as_str().to_string()),
                    error_message: Set(None),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active_model.insert(&self.db).await?
            }
        };

        Ok(record)
    }

    /// 将已存在的记录标记为error状态
    ///
    /// 保留令牌与审计历史；记录不存在时为空操作
    pub async fn mark_error(
        &self,
        user_id: i32,
        provider: &str,
        reason: &str,
    ) -> Result<(), IntegrationError> {
        let Some(record) = self.get(user_id, provider).await? else {
            return Ok(());
        };

        let mut active_model: user_integrations::ActiveModel = record.into();
        active_model.status = Set(IntegrationStatus::Error.as_str().to_string());
        active_model.error_message = Set(Some(reason.to_string()));
        active_model.updated_at = Set(Utc::now().naive_utc());
        active_model.update(&self.db).await?;

        Ok(())
    }

    /// 删除集成记录
    ///
    /// 幂等：删除不存在的行不是错误
    pub async fn delete(&self, user_id: i32, provider: &str) -> Result<(), IntegrationError> {
        UserIntegrations::delete_many()
            .filter(user_integrations::Column::UserId.eq(user_id))
            .filter(user_integrations::Column::Provider.eq(provider))
            .exec(&self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(IntegrationStatus::Active.as_str(), "active");
        assert_eq!(IntegrationStatus::Error.as_str(), "error");
        assert_eq!(IntegrationStatus::Disconnected.to_string(), "disconnected");
    }
}
