use chrono::prelude::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 评分默认值，所有评分模型创建时从200起步
pub const BASE_SCORE: i32 = 200;

/// 开发者信誉评分
///
/// 每个创建过至少一个代币的用户一条。由其代币集合与rug标记按需重算。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeveloperScore {
    /// 开发者钱包地址
    pub developer: String,
    /// 评分，区间[200, 1000]
    pub score: i32,
    /// 已创建代币数
    pub coins_created_count: u32,
    /// 存活超过24小时的代币数
    pub coins_active_24h_plus: u32,
    /// 被rug的代币数
    pub coins_rugged_count: u32,
    /// 观察到的最高市值(只增不减)
    pub highest_market_cap: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeveloperScore {
    pub fn new(developer: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            developer: developer.into(),
            score: BASE_SCORE,
            coins_created_count: 0,
            coins_active_24h_plus: 0,
            coins_rugged_count: 0,
            highest_market_cap: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 交易者信誉评分
///
/// 每个有至少一笔交易的用户一条。由其交易与持仓集合重算。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderScore {
    /// 交易者钱包地址
    pub trader: String,
    /// 评分，区间[0, 1000]
    pub score: i32,
    /// 当前持有的不同代币数
    pub coins_held_count: u32,
    /// 平均持有时长(小时)
    pub avg_holding_time_hours: i64,
    /// 交易笔数
    pub trades_count: u32,
    /// 快速抛售次数
    pub quick_dumps_count: u32,
    /// 盈利交易占比(当前评分公式未使用，仅持久化)
    pub profitable_trades_percent: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TraderScore {
    pub fn new(trader: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            trader: trader.into(),
            score: BASE_SCORE,
            coins_held_count: 0,
            avg_holding_time_hours: 0,
            trades_count: 0,
            quick_dumps_count: 0,
            profitable_trades_percent: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 代币DRC综合评分
///
/// 每个代币一条，综合市场指标、合约安全性与开发者信誉。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinDrcScore {
    /// 代币mint地址
    pub coin: String,
    /// 评分，区间[0, 1000]
    pub score: i32,
    /// 持有人数量(每次重算前刷新)
    pub holders_count: u32,
    /// 币龄(小时，每次重算前刷新)
    pub age_in_hours: i64,
    /// 尾部24小时交易量(每笔交易后重算，不跨窗口缓存)
    pub trade_volume_24h: Decimal,
    /// 价格稳定性评分，区间[0, 100]
    pub price_stability_score: i32,
    /// 合约是否已验证
    pub verified_contract: bool,
    /// 是否完成审计
    pub audit_completed: bool,
    /// 审计评分，区间[0, 100]
    pub audit_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CoinDrcScore {
    pub fn new(coin: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            coin: coin.into(),
            score: BASE_SCORE,
            holders_count: 0,
            age_in_hours: 0,
            trade_volume_24h: Decimal::ZERO,
            price_stability_score: 50,
            verified_contract: false,
            audit_completed: false,
            audit_score: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// 代币评分的分项构成(对外查询接口)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub age_factor: f64,
    pub holder_factor: f64,
    pub volume_factor: f64,
    pub contract_verified: f64,
    pub audit_bonus: f64,
    pub dev_reputation: f64,
    pub stability_factor: f64,
    pub rug_penalty: f64,
    pub total: i32,
}

/// Rug标记
///
/// 每个代币至多一条。一经置为rugged不可逆(本设计未定义撤销操作)。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinRugFlag {
    /// 代币mint地址
    pub coin: String,
    pub is_rugged: bool,
    /// 被标记rugged的时间
    pub rugged_at: Option<DateTime<Utc>>,
    /// 可选的关联交易签名
    pub rug_transaction: Option<String>,
    /// 说明文字
    pub rug_description: String,
}

impl CoinRugFlag {
    pub fn new(coin: impl Into<String>) -> Self {
        Self {
            coin: coin.into(),
            is_rugged: false,
            rugged_at: None,
            rug_transaction: None,
            rug_description: String::new(),
        }
    }
}
