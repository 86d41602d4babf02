use crate::{
    coin::model::Coin,
    error::{LedgerError, LedgerResult},
    score::model::{CoinRugFlag, ScoreBreakdown, BASE_SCORE},
    trade::model::{Trade, TradeType},
    Ledger,
};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 链上建币事件的默认初始供应量与价格(解码载荷中不携带)
const DEFAULT_TOTAL_SUPPLY: u64 = 1_000_000;

/// 交易写入来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeOrigin {
    /// 日志订阅路径: 链上事实，永不拒绝
    OnChain,
    /// REST写入路径: 卖出超过持仓时同步拒绝
    Api,
}

/// 待写入的交易
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub signature: String,
    pub wallet_address: String,
    pub coin_address: String,
    pub trade_type: TradeType,
    pub coin_amount: Decimal,
    pub sol_amount: Decimal,
}

/// 交易写入结果
#[derive(Debug, Clone)]
pub enum TradeOutcome {
    Applied(Trade),
    /// 签名已存在，按幂等契约静默跳过
    Duplicate,
}

/// 解码后的建币事件字段
#[derive(Debug, Clone)]
pub struct CoinCreation {
    pub mint_address: String,
    pub name: String,
    pub ticker: String,
    pub metadata_uri: Option<String>,
    pub authority: String,
    pub decimals: u8,
}

/// 建币写入结果
#[derive(Debug, Clone)]
pub enum CreationOutcome {
    Created(Coin),
    /// mint地址已存在(重连重放)，跳过
    Duplicate,
}

/// 评分初始化统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreInitSummary {
    pub developer_scores: usize,
    pub trader_scores: usize,
    pub coin_scores: usize,
}

/// 评分引擎
///
/// 账本变更的唯一入口。每次变更后同步重算受影响的评分，调用链
/// (Trade→Holding→TraderScore, Trade→Coin→CoinDRCScore, Coin→DeveloperScore)
/// 显式可见，不经任何隐式保存钩子。
///
/// 同一行上的"重算-保存"序列通过行级异步锁互斥: 每个代币一把锁
/// (代币评分行与该币的持仓写入)，每个钱包一把锁(交易者/开发者评分行)。
/// 获取顺序固定为先代币锁、后钱包锁(多个钱包按地址排序)，不相交的行可并行。
pub struct ScoringEngine {
    ledger: Arc<Ledger>,
    coin_locks: DashMap<String, Arc<Mutex<()>>>,
    wallet_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ScoringEngine {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            coin_locks: DashMap::new(),
            wallet_locks: DashMap::new(),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    fn coin_lock(&self, coin: &str) -> Arc<Mutex<()>> {
        self.coin_locks
            .entry(coin.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn wallet_lock(&self, wallet: &str) -> Arc<Mutex<()>> {
        self.wallet_locks
            .entry(wallet.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 写入一笔交易并级联重算评分
    ///
    /// 以交易签名幂等: 重复投递(至少一次语义、重连重放)被静默跳过。
    /// 整个"验证-写入-重算"序列在受影响的代币与钱包行级锁内完成。
    pub async fn apply_trade(&self, new_trade: NewTrade, origin: TradeOrigin) -> LedgerResult<TradeOutcome> {
        if self.ledger.trades.signature_exists(&new_trade.signature) {
            debug!("⏭️ 交易已记录，跳过: {}", new_trade.signature);
            return Ok(TradeOutcome::Duplicate);
        }

        let coin_lock = self.coin_lock(&new_trade.coin_address);
        let _coin_guard = coin_lock.lock().await;

        // 锁内复查，防止并发的同签名投递双写
        if self.ledger.trades.signature_exists(&new_trade.signature) {
            debug!("⏭️ 交易已记录，跳过: {}", new_trade.signature);
            return Ok(TradeOutcome::Duplicate);
        }

        let coin = self
            .ledger
            .coins
            .get(&new_trade.coin_address)
            .ok_or_else(|| LedgerError::UnknownCoin(new_trade.coin_address.clone()))?;

        // 本次写入涉及的钱包评分行: 交易者，CREATE时还有创建者
        let mut wallets = vec![new_trade.wallet_address.clone()];
        if new_trade.trade_type == TradeType::Create && coin.creator != new_trade.wallet_address {
            wallets.push(coin.creator.clone());
        }
        wallets.sort();
        let wallet_locks: Vec<_> = wallets.iter().map(|w| self.wallet_lock(w)).collect();
        let mut wallet_guards = Vec::with_capacity(wallet_locks.len());
        for lock in &wallet_locks {
            wallet_guards.push(lock.lock().await);
        }

        // 卖出校验仅在API写入边界生效；链上路径记录的是既成事实
        if origin == TradeOrigin::Api && new_trade.trade_type == TradeType::Sell {
            let held = self
                .ledger
                .holdings
                .amount_held(&new_trade.wallet_address, &new_trade.coin_address);
            if held < new_trade.coin_amount {
                return Err(LedgerError::InsufficientHolding {
                    wallet: new_trade.wallet_address,
                    coin: new_trade.coin_address,
                    held,
                    requested: new_trade.coin_amount,
                });
            }
        }

        self.ledger.users.get_or_create(&new_trade.wallet_address);

        let trade = Trade {
            id: Uuid::new_v4(),
            signature: new_trade.signature,
            wallet_address: new_trade.wallet_address,
            coin_address: new_trade.coin_address,
            trade_type: new_trade.trade_type,
            coin_amount: new_trade.coin_amount,
            sol_amount: new_trade.sol_amount,
            created_at: Utc::now(),
        };
        self.ledger.trades.append(trade.clone());

        let delta = match trade.trade_type {
            TradeType::Buy | TradeType::Create => trade.coin_amount,
            TradeType::Sell => -trade.coin_amount,
        };
        let remaining = self
            .ledger
            .holdings
            .adjust(&trade.wallet_address, &trade.coin_address, delta);

        // 24小时交易量: 每笔BUY/SELL后在尾部窗口上全量重算
        if matches!(trade.trade_type, TradeType::Buy | TradeType::Sell) {
            let mut coin_score = self.ledger.scores.get_or_create_coin(&trade.coin_address);
            coin_score.trade_volume_24h = self.ledger.trades.volume_24h(&trade.coin_address, Utc::now());
            coin_score.updated_at = Utc::now();
            self.ledger.scores.save_coin(coin_score);
        }

        // 交易者评分行先于可能的持仓删除建立
        self.ledger.scores.get_or_create_trader(&trade.wallet_address);

        if trade.trade_type == TradeType::Create {
            self.recalculate_developer_score(&coin.creator);
        }

        // 评分读数完成后删除归零持仓
        if remaining <= Decimal::ZERO {
            self.ledger
                .holdings
                .remove(&trade.wallet_address, &trade.coin_address);
            debug!(
                "🗑️ 持仓归零已删除: {} / {}",
                trade.wallet_address, trade.coin_address
            );
        }

        self.recalculate_coin_score(&trade.coin_address)?;
        self.recalculate_trader_score(&trade.wallet_address);

        info!(
            "💱 交易已记录: {} {} {} (signature: {})",
            trade.trade_type.as_str(),
            trade.coin_amount,
            coin.ticker,
            trade.signature
        );
        Ok(TradeOutcome::Applied(trade))
    }

    /// 写入一次链上建币事件
    ///
    /// 创建者必须已注册，否则返回[`LedgerError::UnknownUser`]，由路由层
    /// 降级为告警后丢弃。mint地址已存在视为重放，跳过。
    pub async fn apply_coin_creation(
        &self,
        signature: &str,
        creation: CoinCreation,
    ) -> LedgerResult<CreationOutcome> {
        let creator = self
            .ledger
            .users
            .get(&creation.authority)
            .ok_or_else(|| LedgerError::UnknownUser(creation.authority.clone()))?;

        let coin_lock = self.coin_lock(&creation.mint_address);
        let _coin_guard = coin_lock.lock().await;
        let wallet_lock = self.wallet_lock(&creator.wallet_address);
        let _wallet_guard = wallet_lock.lock().await;

        if self.ledger.coins.exists(&creation.mint_address) {
            debug!("⏭️ 代币已存在，跳过建币事件: {}", creation.mint_address);
            return Ok(CreationOutcome::Duplicate);
        }

        let coin = Coin {
            address: creation.mint_address.clone(),
            name: creation.name,
            ticker: creation.ticker,
            creator: creator.wallet_address.clone(),
            total_supply: Decimal::from(DEFAULT_TOTAL_SUPPLY),
            current_price: Decimal::ONE,
            metadata_uri: creation.metadata_uri,
            decimals: creation.decimals,
            created_at: Utc::now(),
        };
        self.ledger.coins.insert_new(coin);

        self.ledger.scores.get_or_create_coin(&creation.mint_address);
        self.recalculate_coin_score(&creation.mint_address)?;

        self.ledger.scores.get_or_create_developer(&creator.wallet_address);
        self.recalculate_developer_score(&creator.wallet_address);

        info!(
            "🪙 建币事件已记录: {} (signature: {})",
            creation.mint_address, signature
        );

        // 重新读取，拿到写入时大写化后的ticker
        let stored = self
            .ledger
            .coins
            .get(&creation.mint_address)
            .ok_or_else(|| LedgerError::UnknownCoin(creation.mint_address.clone()))?;
        Ok(CreationOutcome::Created(stored))
    }

    /// 将代币标记为rugged
    ///
    /// 单向操作，本设计不定义撤销。标记后无条件重算该代币评分
    /// 及其创建者的开发者评分。
    pub async fn mark_as_rugged(
        &self,
        coin_address: &str,
        rug_transaction: Option<String>,
        description: &str,
    ) -> LedgerResult<()> {
        let coin_lock = self.coin_lock(coin_address);
        let _coin_guard = coin_lock.lock().await;

        let coin = self
            .ledger
            .coins
            .get(coin_address)
            .ok_or_else(|| LedgerError::UnknownCoin(coin_address.to_string()))?;

        let wallet_lock = self.wallet_lock(&coin.creator);
        let _wallet_guard = wallet_lock.lock().await;

        let mut flag = self
            .ledger
            .scores
            .get_rug_flag(coin_address)
            .unwrap_or_else(|| CoinRugFlag::new(coin_address));
        flag.is_rugged = true;
        flag.rugged_at = Some(Utc::now());
        if rug_transaction.is_some() {
            flag.rug_transaction = rug_transaction;
        }
        if !description.is_empty() {
            flag.rug_description = description.to_string();
        }
        self.ledger.scores.save_rug_flag(flag);

        warn!("🚨 代币被标记为rugged: {} ({})", coin.ticker, coin_address);

        self.recalculate_coin_score(coin_address)?;
        self.recalculate_developer_score(&coin.creator);
        Ok(())
    }

    /// 更新代币价格并刷新价格稳定性
    pub async fn update_coin_price(&self, coin_address: &str, price: Decimal) -> LedgerResult<()> {
        let coin_lock = self.coin_lock(coin_address);
        let _guard = coin_lock.lock().await;

        if !self.ledger.coins.update_price(coin_address, price) {
            return Err(LedgerError::UnknownCoin(coin_address.to_string()));
        }
        self.update_price_stability(coin_address, price);
        self.recalculate_coin_score(coin_address)?;
        Ok(())
    }

    /// 由尾部24小时窗口内的成交价波动率推导稳定性评分
    ///
    /// 波动率取标准差占均值的百分比，稳定性 = clamp(100 − 波动率, 0, 100)。
    /// 窗口内不足3笔交易时不更新。
    fn update_price_stability(&self, coin_address: &str, new_price: Decimal) {
        let since = Utc::now() - Duration::hours(24);
        let recent = self.ledger.trades.trades_by_coin_since(coin_address, since);
        if recent.len() < 3 {
            return;
        }

        let mut prices: Vec<f64> = recent
            .iter()
            .filter(|t| t.coin_amount > Decimal::ZERO)
            .filter_map(|t| (t.sol_amount / t.coin_amount).to_f64())
            .collect();
        if let Some(p) = new_price.to_f64() {
            if p > 0.0 {
                prices.push(p);
            }
        }
        if prices.is_empty() {
            return;
        }

        let mean = prices.iter().sum::<f64>() / prices.len() as f64;
        if mean <= 0.0 {
            return;
        }
        let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / prices.len() as f64;
        let volatility = (variance.sqrt() / mean) * 100.0;
        let stability = (100.0 - volatility).clamp(0.0, 100.0);

        let mut score = self.ledger.scores.get_or_create_coin(coin_address);
        score.price_stability_score = stability as i32;
        score.updated_at = Utc::now();
        self.ledger.scores.save_coin(score);
    }

    /// 重算开发者评分，返回新评分
    ///
    /// longevity = min(存活超24h代币数 × 100, 300)
    /// volume    = min(已创建代币数 × 50, 200)
    /// 市值加成  = clamp(⌊log10(最高市值) × 25⌋, 0, 100)
    /// rug惩罚   = min(被rug代币数 × 200, 500)
    /// 评分      = clamp(200 + 各项, 200, 1000)
    ///
    /// 并发调用方需先持有该钱包的行级锁。
    pub fn recalculate_developer_score(&self, developer: &str) -> i32 {
        let now = Utc::now();
        let mut row = self.ledger.scores.get_or_create_developer(developer);
        let coins = self.ledger.coins.coins_by_creator(developer);

        row.coins_created_count = coins.len() as u32;

        let one_day_ago = now - Duration::hours(24);
        row.coins_active_24h_plus = coins.iter().filter(|c| c.created_at < one_day_ago).count() as u32;

        // 最高市值只增不减: 记录的是历史观察到的峰值
        for coin in &coins {
            let cap = coin.market_cap(self.ledger.holdings.total_held(&coin.address));
            if cap > row.highest_market_cap {
                row.highest_market_cap = cap;
            }
        }

        row.coins_rugged_count = coins
            .iter()
            .filter(|c| self.ledger.scores.is_rugged(&c.address))
            .count() as u32;

        let longevity = (row.coins_active_24h_plus as i32 * 100).min(300);
        let volume = (row.coins_created_count as i32 * 50).min(200);
        let rug_penalty = (row.coins_rugged_count as i32 * 200).min(500);
        let cap_bonus = match row.highest_market_cap.to_f64() {
            Some(cap) if cap > 0.0 => ((cap.log10() * 25.0).floor() as i32).clamp(0, 100),
            _ => 0,
        };

        row.score = (BASE_SCORE + longevity + volume + cap_bonus - rug_penalty).clamp(BASE_SCORE, 1000);
        row.updated_at = now;
        let score = row.score;
        self.ledger.scores.save_developer(row);
        score
    }

    /// 重算交易者评分，返回新评分
    ///
    /// 无任何交易时保持基准分200。快速抛售定义: 某次SELL距同币种
    /// 最近一次在前BUY不足1小时，且卖出量超过该次买入量的50%。
    ///
    /// 并发调用方需先持有该钱包的行级锁。
    pub fn recalculate_trader_score(&self, trader: &str) -> i32 {
        let now = Utc::now();
        let mut row = self.ledger.scores.get_or_create_trader(trader);
        let trades = self.ledger.trades.trades_by_user(trader);

        row.trades_count = trades.len() as u32;
        if trades.is_empty() {
            row.score = BASE_SCORE;
            row.updated_at = now;
            self.ledger.scores.save_trader(row);
            return BASE_SCORE;
        }

        let holdings = self.ledger.holdings.holdings_of_user(trader);
        row.coins_held_count = holdings.len() as u32;

        // 每个在持币种从最早一次BUY起算持有时长
        let mut total_holding_hours = 0.0f64;
        for holding in &holdings {
            let earliest_buy = trades
                .iter()
                .filter(|t| t.coin_address == holding.coin_address && t.trade_type == TradeType::Buy)
                .min_by_key(|t| t.created_at);
            if let Some(buy) = earliest_buy {
                total_holding_hours += (now - buy.created_at).num_seconds() as f64 / 3600.0;
            }
        }
        row.avg_holding_time_hours = if holdings.is_empty() {
            0
        } else {
            (total_holding_hours / holdings.len() as f64) as i64
        };

        let traded_coins: HashSet<&str> = trades.iter().map(|t| t.coin_address.as_str()).collect();
        let mut quick_dumps = 0u32;
        for coin in traded_coins {
            let mut coin_trades: Vec<&Trade> = trades.iter().filter(|t| t.coin_address == coin).collect();
            coin_trades.sort_by_key(|t| t.created_at);

            for sell in coin_trades.iter().filter(|t| t.trade_type == TradeType::Sell) {
                let previous_buy = coin_trades
                    .iter()
                    .filter(|t| t.trade_type == TradeType::Buy && t.created_at < sell.created_at)
                    .max_by_key(|t| t.created_at);
                if let Some(buy) = previous_buy {
                    let within_hour = (sell.created_at - buy.created_at) < Duration::hours(1);
                    let over_half = buy.coin_amount > Decimal::ZERO
                        && sell.coin_amount * Decimal::TWO > buy.coin_amount;
                    if within_hour && over_half {
                        quick_dumps += 1;
                    }
                }
            }
        }
        row.quick_dumps_count = quick_dumps;

        let diversity = (row.coins_held_count as i32 * 20).min(100);
        let holding_bonus = (row.avg_holding_time_hours.min(168) as f64) / 24.0 * 10.0;
        let activity = (row.trades_count.min(50) as i32) * 2;
        let dump_penalty = (quick_dumps as i32 * 30).min(150);

        let total = BASE_SCORE as f64 + diversity as f64 + holding_bonus + activity as f64 - dump_penalty as f64;
        row.score = (total as i32).clamp(0, 1000);
        row.updated_at = now;
        let score = row.score;
        self.ledger.scores.save_trader(row);
        score
    }

    /// 重算代币DRC评分，返回新评分
    ///
    /// 币龄与持有人数在每次重算前刷新。开发者信誉取已存评分
    /// (不存在时以基准分200建行)，不在此处级联重算。
    ///
    /// 并发调用方需先持有该代币的行级锁。
    pub fn recalculate_coin_score(&self, coin_address: &str) -> LedgerResult<i32> {
        let coin = self
            .ledger
            .coins
            .get(coin_address)
            .ok_or_else(|| LedgerError::UnknownCoin(coin_address.to_string()))?;

        let now = Utc::now();
        let mut row = self.ledger.scores.get_or_create_coin(coin_address);
        row.age_in_hours = (now - coin.created_at).num_hours();
        row.holders_count = self.ledger.holdings.holders_count(coin_address) as u32;

        let dev_score = self.ledger.scores.get_or_create_developer(&coin.creator).score;
        let is_rugged = self.ledger.scores.is_rugged(coin_address);

        let age_factor = (row.age_in_hours as f64 / 24.0).min(10.0) * 20.0;
        let holder_factor = row.holders_count.min(200) as f64 / 2.0;
        let volume_factor = row.trade_volume_24h.to_f64().unwrap_or(0.0).min(1000.0) / 10.0;
        let contract_bonus = if row.verified_contract { 50.0 } else { 0.0 };
        let audit_bonus = if row.audit_completed {
            row.audit_score as f64 / 2.0
        } else {
            0.0
        };
        let dev_factor = dev_score as f64 * 0.2;
        let stability_factor = row.price_stability_score as f64 / 2.0;
        let rug_penalty = if is_rugged { 500.0 } else { 0.0 };

        let total = age_factor + holder_factor + volume_factor + contract_bonus + audit_bonus + dev_factor
            + stability_factor
            - rug_penalty;
        row.score = (total as i32).clamp(0, 1000);
        row.updated_at = now;
        let score = row.score;
        self.ledger.scores.save_coin(row);
        Ok(score)
    }

    /// 代币评分的分项构成(按已存评分行计算，不触发刷新)
    pub fn score_breakdown(&self, coin_address: &str) -> LedgerResult<ScoreBreakdown> {
        let coin = self
            .ledger
            .coins
            .get(coin_address)
            .ok_or_else(|| LedgerError::UnknownCoin(coin_address.to_string()))?;
        let row = self.ledger.scores.get_or_create_coin(coin_address);
        let dev_score = self
            .ledger
            .scores
            .get_developer(&coin.creator)
            .map(|s| s.score)
            .unwrap_or(BASE_SCORE);
        let is_rugged = self.ledger.scores.is_rugged(coin_address);

        Ok(ScoreBreakdown {
            age_factor: (row.age_in_hours as f64 / 24.0).min(10.0) * 20.0,
            holder_factor: row.holders_count.min(200) as f64 / 2.0,
            volume_factor: row.trade_volume_24h.to_f64().unwrap_or(0.0).min(1000.0) / 10.0,
            contract_verified: if row.verified_contract { 50.0 } else { 0.0 },
            audit_bonus: if row.audit_completed {
                row.audit_score as f64 / 2.0
            } else {
                0.0
            },
            dev_reputation: dev_score as f64 * 0.2,
            stability_factor: row.price_stability_score as f64 / 2.0,
            rug_penalty: if is_rugged { -500.0 } else { 0.0 },
            total: row.score,
        })
    }

    /// 为存量实体批量建立/重算评分行
    ///
    /// force为false时只处理尚无评分行的实体。
    pub async fn initialize_scores(&self, force: bool) -> ScoreInitSummary {
        let mut summary = ScoreInitSummary::default();

        for wallet in self.ledger.users.all_addresses() {
            let lock = self.wallet_lock(&wallet);
            let _guard = lock.lock().await;
            if !self.ledger.coins.coins_by_creator(&wallet).is_empty()
                && (force || self.ledger.scores.get_developer(&wallet).is_none())
            {
                self.recalculate_developer_score(&wallet);
                summary.developer_scores += 1;
            }
            if !self.ledger.trades.trades_by_user(&wallet).is_empty()
                && (force || self.ledger.scores.get_trader(&wallet).is_none())
            {
                self.recalculate_trader_score(&wallet);
                summary.trader_scores += 1;
            }
        }

        for mint in self.ledger.coins.all_addresses() {
            let lock = self.coin_lock(&mint);
            let _guard = lock.lock().await;
            if force || self.ledger.scores.get_coin(&mint).is_none() {
                let mut row = self.ledger.scores.get_or_create_coin(&mint);
                row.trade_volume_24h = self.ledger.trades.volume_24h(&mint, Utc::now());
                self.ledger.scores.save_coin(row);
                if self.recalculate_coin_score(&mint).is_ok() {
                    summary.coin_scores += 1;
                }
            }
        }

        info!(
            "📊 评分初始化完成: {}个开发者, {}个交易者, {}个代币",
            summary.developer_scores, summary.trader_scores, summary.coin_scores
        );
        summary
    }
}
