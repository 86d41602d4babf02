use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 持仓记录
///
/// 以(用户, 代币)为键，每对至多一条。
/// 不变量: amount_held = Σ(BUY+CREATE数量) − Σ(SELL数量)，增量维护；
/// 数量降至0及以下时整条删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    /// 用户钱包地址
    pub wallet_address: String,
    /// 代币mint地址
    pub coin_address: String,
    /// 当前持有数量(可为小数)
    pub amount_held: Decimal,
}

impl Holding {
    /// 持有量占总供应量的百分比
    pub fn held_percentage(&self, total_supply: Decimal) -> Decimal {
        if total_supply.is_zero() {
            return Decimal::ZERO;
        }
        (self.amount_held / total_supply) * Decimal::from(100)
    }
}
