use chrono::prelude::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 代币模型
///
/// 以mint地址为主键，地址一经写入不可变。仅在首次解码到创建事件时
/// 创建一次，永不删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coin {
    /// mint地址(主键，不可变)
    pub address: String,
    /// 代币名称
    pub name: String,
    /// 代币符号(写入时统一大写)
    pub ticker: String,
    /// 创建者钱包地址
    pub creator: String,
    /// 总供应量
    pub total_supply: Decimal,
    /// 当前价格
    pub current_price: Decimal,
    /// 元数据URI
    pub metadata_uri: Option<String>,
    /// 小数位数
    pub decimals: u8,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl Coin {
    /// 市值 = (总供应量 - 总持有量) × 当前价格
    pub fn market_cap(&self, total_held: Decimal) -> Decimal {
        (self.total_supply - total_held) * self.current_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_cap() {
        let coin = Coin {
            address: "mint".to_string(),
            name: "Test".to_string(),
            ticker: "TST".to_string(),
            creator: "dev".to_string(),
            total_supply: dec!(1000000),
            current_price: dec!(2),
            metadata_uri: None,
            decimals: 9,
            created_at: Utc::now(),
        };
        assert_eq!(coin.market_cap(dec!(400000)), dec!(1200000));
    }
}
