use super::model::Holding;
use dashmap::DashMap;
use rust_decimal::Decimal;

/// 持仓数据操作接口
#[derive(Debug, Default)]
pub struct HoldingRepository {
    holdings: DashMap<(String, String), Holding>,
}

impl HoldingRepository {
    /// 对(用户, 代币)持仓增量调整，返回调整后的数量
    ///
    /// 记录不存在时从0开始。删除判定由引擎在评分读数完成后执行。
    pub fn adjust(&self, wallet_address: &str, coin_address: &str, delta: Decimal) -> Decimal {
        let key = (wallet_address.to_string(), coin_address.to_string());
        let mut entry = self.holdings.entry(key).or_insert_with(|| Holding {
            wallet_address: wallet_address.to_string(),
            coin_address: coin_address.to_string(),
            amount_held: Decimal::ZERO,
        });
        entry.amount_held += delta;
        entry.amount_held
    }

    pub fn get(&self, wallet_address: &str, coin_address: &str) -> Option<Holding> {
        self.holdings
            .get(&(wallet_address.to_string(), coin_address.to_string()))
            .map(|h| h.clone())
    }

    /// 当前持有数量，无记录时为0
    pub fn amount_held(&self, wallet_address: &str, coin_address: &str) -> Decimal {
        self.get(wallet_address, coin_address)
            .map(|h| h.amount_held)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn remove(&self, wallet_address: &str, coin_address: &str) {
        self.holdings
            .remove(&(wallet_address.to_string(), coin_address.to_string()));
    }

    /// 某代币的持有人数量
    pub fn holders_count(&self, coin_address: &str) -> usize {
        self.holdings.iter().filter(|h| h.coin_address == coin_address).count()
    }

    /// 某代币被持有的总量(市值计算用)
    pub fn total_held(&self, coin_address: &str) -> Decimal {
        self.holdings
            .iter()
            .filter(|h| h.coin_address == coin_address)
            .map(|h| h.amount_held)
            .sum()
    }

    /// 某用户的全部持仓
    pub fn holdings_of_user(&self, wallet_address: &str) -> Vec<Holding> {
        self.holdings
            .iter()
            .filter(|h| h.wallet_address == wallet_address)
            .map(|h| h.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_adjust_accumulates() {
        let repo = HoldingRepository::default();
        assert_eq!(repo.adjust("w", "m", dec!(100)), dec!(100));
        assert_eq!(repo.adjust("w", "m", dec!(-40)), dec!(60));
        assert_eq!(repo.amount_held("w", "m"), dec!(60));
    }

    #[test]
    fn test_holders_and_total_held_scoped_per_coin() {
        let repo = HoldingRepository::default();
        repo.adjust("w1", "m1", dec!(10));
        repo.adjust("w2", "m1", dec!(30));
        repo.adjust("w1", "m2", dec!(5));

        assert_eq!(repo.holders_count("m1"), 2);
        assert_eq!(repo.total_held("m1"), dec!(40));
        assert_eq!(repo.holders_count("m2"), 1);
    }

    #[test]
    fn test_remove() {
        let repo = HoldingRepository::default();
        repo.adjust("w", "m", dec!(10));
        repo.remove("w", "m");
        assert!(repo.get("w", "m").is_none());
        assert_eq!(repo.amount_held("w", "m"), Decimal::ZERO);
    }
}
