use crate::{
    config::EventListenerConfig,
    error::{EventListenerError, Result},
    subscriber::LogNotificationHandler,
};
use futures::StreamExt;
use solana_client::{
    nonblocking::pubsub_client::PubsubClient,
    rpc_config::{RpcTransactionLogsConfig, RpcTransactionLogsFilter},
};
use solana_sdk::commitment_config::CommitmentConfig;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::RwLock, time::sleep};
use tracing::{debug, info, warn};

/// 重连退避的延迟上限
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// 订阅生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Disconnected,
    Connecting,
    Subscribed,
    Streaming,
    Reconnecting,
    Stopped,
}

/// 第attempt次重连前的等待时长: min(base * 2^(attempt-1), 60秒)
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let shift = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift).min(MAX_BACKOFF)
}

/// 程序日志订阅器
///
/// 维护与Solana WebSocket的日志订阅，按交易签名把整笔日志交给
/// 处理回调。断线后指数退避重连，连接成功即重置重试计数；
/// 流自然结束时按auto_restart决定是否重新订阅。
pub struct LogListener {
    config: Arc<EventListenerConfig>,
    handler: Arc<dyn LogNotificationHandler>,
    should_run: Arc<AtomicBool>,
    retry_count: AtomicU32,
    state: RwLock<ListenerState>,
}

impl LogListener {
    pub fn new(config: Arc<EventListenerConfig>, handler: Arc<dyn LogNotificationHandler>) -> Self {
        Self {
            config,
            handler,
            should_run: Arc::new(AtomicBool::new(false)),
            retry_count: AtomicU32::new(0),
            state: RwLock::new(ListenerState::Disconnected),
        }
    }

    /// 运行订阅主循环，直到stop()或重连次数耗尽
    pub async fn run(&self) -> Result<()> {
        self.should_run.store(true, Ordering::Relaxed);
        info!(
            "🚀 启动日志订阅器: program={} ws={}",
            self.config.solana.program_id, self.config.solana.ws_url
        );

        loop {
            if !self.should_run.load(Ordering::Relaxed) {
                break;
            }
            self.set_state(ListenerState::Connecting).await;

            match self.connect_and_stream().await {
                Ok(()) => {
                    if !self.should_run.load(Ordering::Relaxed) || !self.config.listener.auto_restart {
                        break;
                    }
                    info!("🔄 订阅流正常结束，自动重启");
                    self.record_connect_success();
                    sleep(Duration::from_millis(self.config.listener.retry_delay_ms)).await;
                }
                Err(e) => {
                    if !self.should_run.load(Ordering::Relaxed) {
                        break;
                    }
                    let (attempt, delay) = self.next_backoff();
                    if let Some(max) = self.config.listener.max_retries {
                        if attempt > max {
                            self.set_state(ListenerState::Stopped).await;
                            warn!("❌ 重连次数耗尽({}次)，订阅器退出", max);
                            return Err(EventListenerError::RetriesExhausted { attempts: max });
                        }
                    }
                    warn!("⚠️ 订阅中断: {}，第{}次重连将在{:?}后", e, attempt, delay);
                    self.set_state(ListenerState::Reconnecting).await;
                    sleep(delay).await;
                }
            }
        }

        self.set_state(ListenerState::Stopped).await;
        info!("🛑 日志订阅器已停止");
        Ok(())
    }

    /// 请求停止。幂等，可并发调用；在一次通知等待内被观察到。
    pub fn stop(&self) {
        self.should_run.store(false, Ordering::Relaxed);
    }

    pub async fn state(&self) -> ListenerState {
        *self.state.read().await
    }

    pub async fn is_healthy(&self) -> bool {
        self.state().await == ListenerState::Streaming
    }

    async fn set_state(&self, state: ListenerState) {
        *self.state.write().await = state;
    }

    /// 连接成功，重试计数归零，下一次中断从基准延迟重新开始
    fn record_connect_success(&self) {
        self.retry_count.store(0, Ordering::Relaxed);
    }

    /// 记录一次连接失败，返回(第几次尝试, 重连前的等待时长)
    fn next_backoff(&self) -> (u32, Duration) {
        let attempt = self.retry_count.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = backoff_delay(Duration::from_millis(self.config.listener.retry_delay_ms), attempt);
        (attempt, delay)
    }

    /// 建立连接、订阅并消费日志流，直到停止或流断开
    async fn connect_and_stream(&self) -> Result<()> {
        let ws_url = &self.config.solana.ws_url;
        debug!("🔗 连接WebSocket: {}", ws_url);

        let client = PubsubClient::new(ws_url)
            .await
            .map_err(|e| EventListenerError::WebSocket(format!("连接{}失败: {}", ws_url, e)))?;

        let filter = RpcTransactionLogsFilter::Mentions(vec![self.config.solana.program_id.to_string()]);
        let logs_config = RpcTransactionLogsConfig {
            commitment: Some(parse_commitment_config(&self.config.solana.commitment)),
        };

        let (mut stream, unsubscribe) = client
            .logs_subscribe(filter, logs_config)
            .await
            .map_err(|e| EventListenerError::Subscription(format!("订阅程序日志失败: {}", e)))?;

        self.record_connect_success();
        self.set_state(ListenerState::Subscribed).await;
        info!("✅ 日志订阅建立成功: {}", self.config.solana.program_id);
        self.set_state(ListenerState::Streaming).await;

        let result = loop {
            if !self.should_run.load(Ordering::Relaxed) {
                break Ok(());
            }
            match stream.next().await {
                Some(response) => {
                    let logs = response.value;
                    if logs.err.is_some() {
                        debug!("⏭️ 跳过失败交易: {}", logs.signature);
                        continue;
                    }
                    debug!("📨 接收到交易日志: {}", logs.signature);
                    self.handler.on_transaction_logs(&logs.signature, &logs.logs).await;
                }
                None => {
                    // 对端关闭订阅流: 正常结束，是否重启由auto_restart决定
                    warn!("📡 订阅流已关闭: {}", self.config.solana.program_id);
                    break Ok(());
                }
            }
        };

        // 先取消订阅再关闭连接，尽力而为
        drop(stream);
        unsubscribe().await;
        if let Err(e) = client.shutdown().await {
            debug!("关闭WebSocket连接时出错: {}", e);
        }

        result
    }
}

fn parse_commitment_config(s: &str) -> CommitmentConfig {
    match s.to_lowercase().as_str() {
        "processed" => CommitmentConfig::processed(),
        "finalized" => CommitmentConfig::finalized(),
        _ => CommitmentConfig::confirmed(),
    }
}
