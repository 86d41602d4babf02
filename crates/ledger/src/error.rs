use rust_decimal::Decimal;
use thiserror::Error;

/// 账本错误类型定义
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("用户不存在: {0}")]
    UnknownUser(String),

    #[error("代币不存在: {0}")]
    UnknownCoin(String),

    #[error("重复的交易签名: {0}")]
    DuplicateSignature(String),

    #[error("持仓不足: {wallet} 在 {coin} 上持有 {held}，卖出 {requested} 被拒绝")]
    InsufficientHolding {
        wallet: String,
        coin: String,
        held: Decimal,
        requested: Decimal,
    },
}

/// Result类型别名
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
