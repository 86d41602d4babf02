use super::model::{CoinDrcScore, CoinRugFlag, DeveloperScore, TraderScore};
use dashmap::DashMap;

/// 评分数据操作接口
///
/// 评分是由账本派生的状态，归评分引擎所有；任何评分行的写入都只应
/// 来自引擎的重算函数。
#[derive(Debug, Default)]
pub struct ScoreRepository {
    developer_scores: DashMap<String, DeveloperScore>,
    trader_scores: DashMap<String, TraderScore>,
    coin_scores: DashMap<String, CoinDrcScore>,
    rug_flags: DashMap<String, CoinRugFlag>,
}

impl ScoreRepository {
    pub fn get_or_create_developer(&self, developer: &str) -> DeveloperScore {
        self.developer_scores
            .entry(developer.to_string())
            .or_insert_with(|| DeveloperScore::new(developer))
            .clone()
    }

    pub fn get_developer(&self, developer: &str) -> Option<DeveloperScore> {
        self.developer_scores.get(developer).map(|s| s.clone())
    }

    pub fn save_developer(&self, score: DeveloperScore) {
        self.developer_scores.insert(score.developer.clone(), score);
    }

    pub fn get_or_create_trader(&self, trader: &str) -> TraderScore {
        self.trader_scores
            .entry(trader.to_string())
            .or_insert_with(|| TraderScore::new(trader))
            .clone()
    }

    pub fn get_trader(&self, trader: &str) -> Option<TraderScore> {
        self.trader_scores.get(trader).map(|s| s.clone())
    }

    pub fn save_trader(&self, score: TraderScore) {
        self.trader_scores.insert(score.trader.clone(), score);
    }

    pub fn get_or_create_coin(&self, coin: &str) -> CoinDrcScore {
        self.coin_scores
            .entry(coin.to_string())
            .or_insert_with(|| CoinDrcScore::new(coin))
            .clone()
    }

    pub fn get_coin(&self, coin: &str) -> Option<CoinDrcScore> {
        self.coin_scores.get(coin).map(|s| s.clone())
    }

    pub fn save_coin(&self, score: CoinDrcScore) {
        self.coin_scores.insert(score.coin.clone(), score);
    }

    pub fn get_rug_flag(&self, coin: &str) -> Option<CoinRugFlag> {
        self.rug_flags.get(coin).map(|f| f.clone())
    }

    /// 代币是否被标记为rugged
    pub fn is_rugged(&self, coin: &str) -> bool {
        self.rug_flags.get(coin).map(|f| f.is_rugged).unwrap_or(false)
    }

    pub fn save_rug_flag(&self, flag: CoinRugFlag) {
        self.rug_flags.insert(flag.coin.clone(), flag);
    }
}
