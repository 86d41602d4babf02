pub mod log_listener;

pub use log_listener::{backoff_delay, ListenerState, LogListener};

use async_trait::async_trait;

/// 日志通知处理回调
///
/// 投递语义为至少一次: 重连后同一笔交易可能再次送达，
/// 实现方需自行幂等。
#[async_trait]
pub trait LogNotificationHandler: Send + Sync {
    async fn on_transaction_logs(&self, signature: &str, logs: &[String]);
}
