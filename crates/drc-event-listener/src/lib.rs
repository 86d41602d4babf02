pub mod config;
pub mod error;
pub mod parser;
pub mod processor;
pub mod subscriber;

pub use error::{EventListenerError, Result};

use crate::{config::EventListenerConfig, processor::EventRouter, subscriber::LogListener};
use ledger::{Ledger, ScoringEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

/// 关闭时等待订阅任务完成在途事件处理的最长时长
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Event-Listener 主服务
///
/// 负责协调各子模块运行:
/// - WebSocket日志订阅与断线重连
/// - 事件解码与路由
/// - 账本写入与评分级联重算
/// - 事件广播
pub struct EventListenerService {
    config: Arc<EventListenerConfig>,
    engine: Arc<ScoringEngine>,
    router: Arc<EventRouter>,
    listener: Arc<LogListener>,
}

impl EventListenerService {
    /// 创建新的Event-Listener服务实例
    pub fn new(config: EventListenerConfig) -> Self {
        let config = Arc::new(config);

        info!("🚀 初始化Event-Listener服务...");

        let engine = Arc::new(ScoringEngine::new(Ledger::new()));
        let router = Arc::new(EventRouter::new(
            Arc::clone(&engine),
            config.listener.channel_capacity,
        ));
        let listener = Arc::new(LogListener::new(
            Arc::clone(&config),
            Arc::clone(&router) as Arc<dyn subscriber::LogNotificationHandler>,
        ));

        info!("✅ Event-Listener服务初始化完成");

        Self {
            config,
            engine,
            router,
            listener,
        }
    }

    /// 启动服务，运行至收到关闭信号
    pub async fn start(&self) -> Result<()> {
        info!("🎯 启动Event-Listener服务...");

        let mut listener_task = {
            let listener = Arc::clone(&self.listener);
            tokio::spawn(async move {
                if let Err(e) = listener.run().await {
                    error!("❌ 日志订阅器运行失败: {}", e);
                }
            })
        };

        let cleanup_task = {
            let router = Arc::clone(&self.router);
            tokio::spawn(async move {
                router.run_signature_cache_cleanup().await;
            })
        };

        info!("✅ Event-Listener服务启动完成");

        self.wait_for_shutdown_signal().await;

        info!("🛑 接收到关闭信号，开始优雅关闭...");
        self.listener.stop();
        cleanup_task.abort();
        // 等待订阅任务观察到停止标志并做完手头的事件处理，再退出
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut listener_task).await.is_err() {
            warn!("⚠️ 订阅任务未在{:?}内退出，强制终止", SHUTDOWN_GRACE);
            listener_task.abort();
        }
        info!("✅ Event-Listener服务已优雅关闭");
        Ok(())
    }

    /// 等待关闭信号
    async fn wait_for_shutdown_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("安装Ctrl+C处理器失败: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    warn!("安装TERM信号处理器失败: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("接收到Ctrl+C信号");
            },
            _ = terminate => {
                info!("接收到TERM信号");
            },
        }
    }

    /// 获取配置信息（用于健康检查和调试）
    pub fn get_config(&self) -> Arc<EventListenerConfig> {
        Arc::clone(&self.config)
    }

    /// 获取评分引擎（用于查询接口）
    pub fn engine(&self) -> Arc<ScoringEngine> {
        Arc::clone(&self.engine)
    }

    /// 获取事件广播接收器
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<processor::EventBroadcast> {
        self.router.subscribe()
    }

    /// 订阅器是否处于健康的流式消费状态
    pub async fn is_healthy(&self) -> bool {
        self.listener.is_healthy().await
    }
}
