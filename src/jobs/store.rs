//! 任务与回调记录的持久化接口

use async_trait::async_trait;

use super::model::{CallbackAttempt, TranslationJob};
use crate::translation::error::TranslationResult;

/// 任务存储
///
/// 终态写入必须是条件更新：只有仍处于 `Pending` 的任务才会被覆盖。
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &TranslationJob) -> TranslationResult<()>;

    async fn get(&self, id: &str) -> TranslationResult<Option<TranslationJob>>;

    /// 记录已开始的执行次数
    async fn record_attempt(&self, id: &str, attempts: u32) -> TranslationResult<()>;

    /// 写入终态；任务已是终态时返回 `false` 且不做任何修改
    async fn finalize(&self, job: &TranslationJob) -> TranslationResult<bool>;

    /// 所有仍待处理的任务，按创建时间排序
    async fn pending(&self) -> TranslationResult<Vec<TranslationJob>>;

    /// 标记回调结束（投递成功或重试耗尽），只对终态任务生效
    async fn settle_callback(&self, id: &str) -> TranslationResult<()>;

    /// 已进入终态但回调尚未结束的任务，按更新时间排序
    async fn unsettled_callbacks(&self) -> TranslationResult<Vec<TranslationJob>>;
}

/// 回调尝试记录（只追加）
#[async_trait]
pub trait CallbackLog: Send + Sync {
    async fn append(&self, attempt: &CallbackAttempt) -> TranslationResult<()>;

    async fn attempts_for(&self, job_id: &str) -> TranslationResult<Vec<CallbackAttempt>>;
}
