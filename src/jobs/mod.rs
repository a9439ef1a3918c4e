//! 异步任务模块
//!
//! - **model**: 请求、任务、回调载荷与投递记录
//! - **store**: 任务与回调记录的持久化接口
//! - **queue**: 带重试和退避的进程内工作队列
//! - **scheduler**: 翻译任务的接收、执行与终态写入
//! - **callback**: 回调投递与记录

pub mod callback;
pub mod model;
pub mod queue;
pub mod scheduler;
pub mod store;

pub use callback::{CallbackDispatcher, HttpWebhookClient, WebhookClient, WebhookResponse};
pub use model::{
    CallbackAttempt, CallbackPayload, CallbackStatus, JobOutput, JobStatus, TranslationJob,
    TranslationRequest,
};
pub use queue::{JobFailure, RetryPolicy};
pub use scheduler::{JobScheduler, RecoveryReport};
pub use store::{CallbackLog, JobStore};
