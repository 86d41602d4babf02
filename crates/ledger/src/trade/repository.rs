use super::model::{Trade, TradeType};
use chrono::prelude::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// 交易数据操作接口
///
/// 只追加存储。`signature_index`承担至少一次投递语义下的去重职责。
#[derive(Debug, Default)]
pub struct TradeRepository {
    trades: RwLock<Vec<Trade>>,
    signature_index: DashMap<String, Uuid>,
}

impl TradeRepository {
    /// 追加一条交易，签名已存在时返回false
    pub fn append(&self, trade: Trade) -> bool {
        if self.signature_index.contains_key(&trade.signature) {
            return false;
        }
        self.signature_index.insert(trade.signature.clone(), trade.id);
        self.trades
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(trade);
        true
    }

    /// 该签名是否已被记录(去重边界)
    pub fn signature_exists(&self, signature: &str) -> bool {
        self.signature_index.contains_key(signature)
    }

    /// 某用户的全部交易，时间升序
    pub fn trades_by_user(&self, wallet_address: &str) -> Vec<Trade> {
        self.trades
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|t| t.wallet_address == wallet_address)
            .cloned()
            .collect()
    }

    /// 某用户在某代币上的全部交易，时间升序
    pub fn trades_by_user_and_coin(&self, wallet_address: &str, coin_address: &str) -> Vec<Trade> {
        self.trades
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|t| t.wallet_address == wallet_address && t.coin_address == coin_address)
            .cloned()
            .collect()
    }

    /// 某代币在since之后的全部交易，时间升序
    pub fn trades_by_coin_since(&self, coin_address: &str, since: DateTime<Utc>) -> Vec<Trade> {
        self.trades
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|t| t.coin_address == coin_address && t.created_at >= since)
            .cloned()
            .collect()
    }

    /// 尾部24小时窗口内该代币BUY/SELL交易的报价数量之和
    pub fn volume_24h(&self, coin_address: &str, now: DateTime<Utc>) -> rust_decimal::Decimal {
        let since = now - chrono::Duration::hours(24);
        self.trades_by_coin_since(coin_address, since)
            .iter()
            .filter(|t| matches!(t.trade_type, TradeType::Buy | TradeType::Sell))
            .map(|t| t.sol_amount)
            .sum()
    }

    /// 展示用: 最近的交易在前
    pub fn recent(&self, limit: usize) -> Vec<Trade> {
        let store = self.trades.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut trades: Vec<Trade> = store.iter().cloned().collect();
        trades.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        trades.truncate(limit);
        trades
    }

    pub fn count(&self) -> usize {
        self.trades.read().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }
}
