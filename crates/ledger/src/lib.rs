////////////////////////////////////////////////////////////////////////
//
// 1. 每个Domain(Entity)单独一个文件夹
// 2. 每个Domain由两部分组成:
//    - model: 定义Schema
//    - repository: 实际的底层读写操作
// 3. engine: 评分引擎，账本变更后的唯一评分重算入口
//
//////////////////////////////////////////////////////////////////////

use std::sync::Arc;
use tracing::info;

pub mod coin;
pub mod engine;
pub mod error;
pub mod holding;
pub mod score;
pub mod trade;
pub mod user;

pub use engine::{CoinCreation, CreationOutcome, NewTrade, ScoringEngine, TradeOrigin, TradeOutcome};
pub use error::{LedgerError, LedgerResult};
pub use trade::model::{Trade, TradeType};

/// 账本聚合
///
/// 持有全部领域仓库。交易/持仓/评分的所有变更都必须经过
/// [`engine::ScoringEngine`]，以保证"评分是账本状态的纯函数"这一不变量。
#[derive(Debug, Default)]
pub struct Ledger {
    pub users: user::repository::UserRepository,
    pub coins: coin::repository::CoinRepository,
    pub trades: trade::repository::TradeRepository,
    pub holdings: holding::repository::HoldingRepository,
    pub scores: score::repository::ScoreRepository,
}

impl Ledger {
    /// 创建空账本
    pub fn new() -> Arc<Self> {
        let ledger = Arc::new(Self::default());
        info!("🧱 账本初始化完成");
        ledger
    }
}
