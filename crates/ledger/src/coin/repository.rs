use super::model::Coin;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::info;

/// 代币数据操作接口
#[derive(Debug, Default)]
pub struct CoinRepository {
    coins: DashMap<String, Coin>,
}

impl CoinRepository {
    /// 插入新代币，地址已存在时返回false(地址不可变，不覆盖)
    ///
    /// ticker在写入时统一转为大写。
    pub fn insert_new(&self, mut coin: Coin) -> bool {
        if self.coins.contains_key(&coin.address) {
            return false;
        }
        coin.ticker = coin.ticker.to_uppercase();
        info!("🪙 新代币: {} ({})", coin.name, coin.ticker);
        self.coins.insert(coin.address.clone(), coin);
        true
    }

    pub fn get(&self, address: &str) -> Option<Coin> {
        self.coins.get(address).map(|c| c.clone())
    }

    pub fn exists(&self, address: &str) -> bool {
        self.coins.contains_key(address)
    }

    /// 某创建者名下全部代币
    pub fn coins_by_creator(&self, creator: &str) -> Vec<Coin> {
        self.coins
            .iter()
            .filter(|c| c.creator == creator)
            .map(|c| c.clone())
            .collect()
    }

    /// 更新当前价格(地址之外的唯一可变市场字段)
    pub fn update_price(&self, address: &str, price: Decimal) -> bool {
        match self.coins.get_mut(address) {
            Some(mut coin) => {
                coin.current_price = price;
                true
            }
            None => false,
        }
    }

    pub fn count(&self) -> usize {
        self.coins.len()
    }

    /// 全部mint地址(评分初始化用)
    pub fn all_addresses(&self) -> Vec<String> {
        self.coins.iter().map(|c| c.key().clone()).collect()
    }
}
