use thiserror::Error;

/// Event-Listener 错误类型定义
#[derive(Error, Debug)]
pub enum EventListenerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("WebSocket连接错误: {0}")]
    WebSocket(String),

    #[error("订阅错误: {0}")]
    Subscription(String),

    #[error("重连次数耗尽，已尝试{attempts}次")]
    RetriesExhausted { attempts: u32 },

    #[error("事件{event}载荷与schema不符: {detail}")]
    SchemaMismatch { event: &'static str, detail: String },

    #[error("事件{event}载荷在字段{field}处截断")]
    TruncatedPayload { event: &'static str, field: &'static str },

    #[error("事件解析错误: {0}")]
    EventParsing(String),

    #[error("Base64解码错误: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("账本错误: {0}")]
    Ledger(#[from] ledger::LedgerError),

    #[error("未知错误: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for EventListenerError {
    fn from(err: anyhow::Error) -> Self {
        EventListenerError::Unknown(err.to_string())
    }
}

impl From<solana_client::client_error::ClientError> for EventListenerError {
    fn from(err: solana_client::client_error::ClientError) -> Self {
        EventListenerError::WebSocket(err.to_string())
    }
}

/// Result类型别名
pub type Result<T> = std::result::Result<T, EventListenerError>;
