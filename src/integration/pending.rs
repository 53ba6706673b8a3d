//! # 待处理授权存储
//!
//! 单次授权尝试的Code Verifier短期存储：按 (用户, 提供商) 分区，
//! 10分钟TTL，首次取用即删除，过期或已消费的回调重放必然失败

use std::time::Duration;

use moka::future::Cache;

/// 验证器存活时间
pub const VERIFIER_TTL: Duration = Duration::from_secs(600);

/// 待处理授权存储
#[derive(Debug, Clone)]
pub struct PendingAuthorizations {
    cache: Cache<String, String>,
}

impl PendingAuthorizations {
    /// 创建新的存储
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: Cache::builder()
                .time_to_live(VERIFIER_TTL)
                .max_capacity(10_000)
                .build(),
        }
    }

    /// 按 (用户, 提供商) 组合生成键
    fn key(user_id: i32, provider: &str) -> String {
        format!("{user_id}:{provider}_code_verifier")
    }

    /// 写入验证器，覆盖同键的旧条目（每个组合仅允许一次在途授权）
    pub async fn put(&self, user_id: i32, provider: &str, verifier: String) {
        self.cache.insert(Self::key(user_id, provider), verifier).await;
    }

    /// 取用并删除验证器（单次使用，原子移除）
    pub async fn take(&self, user_id: i32, provider: &str) -> Option<String> {
        self.cache.remove(&Self::key(user_id, provider)).await
    }
}

impl Default for PendingAuthorizations {
    fn default() -> Self {
        Self::new()
    }
}
