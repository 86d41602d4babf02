use chrono::prelude::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 交易类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    Buy,
    Sell,
    /// 建币时的初始分配
    Create,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
            TradeType::Create => "CREATE",
        }
    }
}

/// 交易记录
///
/// 只追加: 写入后永不修改或删除。展示按创建时间倒序，
/// 聚合计算使用全量历史或尾部时间窗口。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// 生成的唯一ID
    pub id: Uuid,
    /// 链上交易签名(幂等去重键)
    pub signature: String,
    /// 交易者钱包地址
    pub wallet_address: String,
    /// 代币mint地址
    pub coin_address: String,
    /// 交易类型
    pub trade_type: TradeType,
    /// 代币数量(非负)
    pub coin_amount: Decimal,
    /// 报价数量，以SOL计(非负)
    pub sol_amount: Decimal,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}
