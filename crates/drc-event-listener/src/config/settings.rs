use crate::error::{EventListenerError, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;
use tracing::info;

/// Event-Listener配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventListenerConfig {
    /// Solana配置
    pub solana: SolanaConfig,
    /// 监听器配置
    pub listener: ListenerConfig,
}

/// Solana网络配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolanaConfig {
    /// WebSocket URL
    pub ws_url: String,
    /// Commitment level (processed, confirmed, finalized)
    pub commitment: String,
    /// 目标程序ID (要监听的合约地址)
    pub program_id: Pubkey,
}

/// 监听器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// 首次重连延迟（毫秒），之后按指数退避增长
    pub retry_delay_ms: u64,
    /// 最大重连次数，为空则无限重试
    pub max_retries: Option<u32>,
    /// 连接正常结束后是否自动重启订阅
    pub auto_restart: bool,
    /// 事件广播通道容量
    pub channel_capacity: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 5000,
            max_retries: None,
            auto_restart: true,
            channel_capacity: 1024,
        }
    }
}

impl EventListenerConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        info!("🔧 从环境变量加载Event-Listener配置...");

        let program_id_raw = std::env::var("PROGRAM_ID")
            .map_err(|_| EventListenerError::Config("缺少环境变量PROGRAM_ID".to_string()))?;
        let program_id = Pubkey::from_str(program_id_raw.trim())
            .map_err(|e| EventListenerError::Config(format!("无效的程序ID {}: {}", program_id_raw, e)))?;

        let solana = SolanaConfig {
            ws_url: std::env::var("WS_URL").unwrap_or_else(|_| "wss://api.devnet.solana.com".to_string()),
            commitment: std::env::var("SOLANA_COMMITMENT").unwrap_or_else(|_| "confirmed".to_string()),
            program_id,
        };

        let defaults = ListenerConfig::default();
        let listener = ListenerConfig {
            retry_delay_ms: std::env::var("EVENT_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_delay_ms),
            max_retries: std::env::var("EVENT_MAX_RETRIES").ok().and_then(|s| s.parse().ok()),
            auto_restart: std::env::var("EVENT_AUTO_RESTART")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.auto_restart),
            channel_capacity: std::env::var("EVENT_CHANNEL_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.channel_capacity),
        };

        let config = Self { solana, listener };

        info!("✅ Event-Listener配置加载完成");
        info!("🔗 监听程序: {}", config.solana.program_id);
        info!("🔌 WebSocket URL: {}", config.solana.ws_url);

        Ok(config)
    }
}
