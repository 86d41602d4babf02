use crate::{
    error::{EventListenerError, Result},
    parser::{DecodedEvent, EventKind, EventRegistry},
    subscriber::LogNotificationHandler,
};
use async_trait::async_trait;
use dashmap::DashMap;
use ledger::{CoinCreation, CreationOutcome, NewTrade, ScoringEngine, TradeOrigin, TradeOutcome};
use ledger::{LedgerError, TradeType};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// 指令名所在日志行的前缀标记
const INSTRUCTION_MARKER: &str = "Program log: Instruction: ";

/// 签名缓存条目的保留时长
const SIGNATURE_CACHE_TTL: Duration = Duration::from_secs(3600);

/// 签名缓存的清理周期
const SIGNATURE_CACHE_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// 未知代币兜底建档时使用的占位名称
const PLACEHOLDER_TOKEN_NAME: &str = "Unknown Token";

/// 路由成功后对外广播的事件通知
#[derive(Debug, Clone)]
pub struct EventBroadcast {
    pub event_type: &'static str,
    pub signature: String,
    pub fields: serde_json::Value,
}

/// 事件路由器
///
/// 从一笔交易的日志中定位指令，按对应schema向后扫描第一条可解码的
/// 载荷行(首个匹配生效)，再把解码结果写入账本并广播。
///
/// 单个事件的失败只影响该事件: 解析/账本错误在此降级为日志，
/// 订阅流不中断。
pub struct EventRouter {
    engine: Arc<ScoringEngine>,
    registry: EventRegistry,
    /// 已处理交易签名及处理时刻，重连重放时在路由层直接跳过。
    /// 仅在处理成功后写入，失败的通知留待至少一次语义重投；
    /// 过期条目由周期清理任务移除，重放安全由账本侧去重兜底。
    processed_signatures: DashMap<String, Instant>,
    event_sender: broadcast::Sender<EventBroadcast>,
}

impl EventRouter {
    pub fn new(engine: Arc<ScoringEngine>, channel_capacity: usize) -> Self {
        let (event_sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            engine,
            registry: EventRegistry::new(),
            processed_signatures: DashMap::new(),
            event_sender,
        }
    }

    /// 获取事件广播接收器
    pub fn subscribe(&self) -> broadcast::Receiver<EventBroadcast> {
        self.event_sender.subscribe()
    }

    /// 处理一笔交易的完整日志
    pub async fn process_transaction_logs(&self, signature: &str, logs: &[String]) -> Result<()> {
        if self.processed_signatures.contains_key(signature) {
            debug!("⏭️ 交易已处理，跳过: {}", signature);
            return Ok(());
        }

        let result = self.route_transaction(signature, logs).await;
        if result.is_ok() {
            self.processed_signatures.insert(signature.to_string(), Instant::now());
        }
        result
    }

    /// 清除缓存中超过保留时长的签名，返回移除条数
    pub fn prune_signature_cache(&self, max_age: Duration) -> usize {
        let before = self.processed_signatures.len();
        self.processed_signatures.retain(|_, seen_at| seen_at.elapsed() < max_age);
        before - self.processed_signatures.len()
    }

    /// 周期性清理签名缓存
    pub async fn run_signature_cache_cleanup(&self) {
        loop {
            tokio::time::sleep(SIGNATURE_CACHE_CLEANUP_INTERVAL).await;
            let removed = self.prune_signature_cache(SIGNATURE_CACHE_TTL);
            if removed > 0 {
                debug!("🗑️ 签名缓存清理完成，移除{}条", removed);
            }
        }
    }

    async fn route_transaction(&self, signature: &str, logs: &[String]) -> Result<()> {
        // 定位指令行，确定事件类型
        let Some((index, instruction)) = logs.iter().enumerate().find_map(|(i, line)| {
            line.find(INSTRUCTION_MARKER)
                .map(|pos| (i, line[pos + INSTRUCTION_MARKER.len()..].trim()))
        }) else {
            debug!("⏭️ 日志中无指令标记，跳过: {}", signature);
            return Ok(());
        };

        let Some(kind) = self.registry.kind_for_instruction(instruction) else {
            debug!("⏭️ 未注册的指令{}，跳过: {}", instruction, signature);
            return Ok(());
        };

        // 从指令行向后找第一条按该schema可解码的载荷行。
        // discriminator属于其他事件的载荷行不是本事件的数据，继续向后扫描。
        let mut decoded = None;
        for line in &logs[index..] {
            match self.registry.decode_log_line(kind, line) {
                Ok(Some(event)) => {
                    decoded = Some(event);
                    break;
                }
                Ok(None) => continue,
                Err(EventListenerError::SchemaMismatch { detail, .. }) => {
                    debug!("⏭️ 载荷行不属于{}: {}", kind.event_name(), detail);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        let Some(decoded) = decoded else {
            warn!("⚠️ 交易{}含{}指令但无匹配载荷", signature, instruction);
            return Ok(());
        };

        match kind {
            EventKind::CreateToken => self.handle_token_creation(signature, decoded).await,
            EventKind::BuyTokens => self.handle_trade(signature, decoded, TradeType::Buy).await,
            EventKind::SellTokens => self.handle_trade(signature, decoded, TradeType::Sell).await,
        }
    }

    async fn handle_token_creation(&self, signature: &str, decoded: DecodedEvent) -> Result<()> {
        let creation = CoinCreation {
            mint_address: field_str(&decoded, "mint_address")?.to_string(),
            name: field_str(&decoded, "token_name")?.to_string(),
            ticker: field_str(&decoded, "token_symbol")?.to_string(),
            metadata_uri: Some(field_str(&decoded, "token_uri")?.to_string()).filter(|s| !s.is_empty()),
            authority: field_str(&decoded, "authority")?.to_string(),
            decimals: field_u8(&decoded, "decimals")?,
        };

        match self.engine.apply_coin_creation(signature, creation).await {
            Ok(CreationOutcome::Created(coin)) => {
                self.broadcast("TokenCreatedEvent", signature, &decoded);
                info!("🪙 代币建档完成: {} ({})", coin.ticker, coin.address);
                Ok(())
            }
            Ok(CreationOutcome::Duplicate) => Ok(()),
            // 创建者未注册: 告警后丢弃，不重试
            Err(LedgerError::UnknownUser(wallet)) => {
                warn!("⚠️ 建币事件创建者未注册，丢弃: {} (signature: {})", wallet, signature);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_trade(&self, signature: &str, decoded: DecodedEvent, trade_type: TradeType) -> Result<()> {
        let wallet_field = match trade_type {
            TradeType::Buy => "buyer",
            _ => "seller",
        };
        let wallet = field_str(&decoded, wallet_field)?.to_string();
        let mint = field_str(&decoded, "mint_address")?.to_string();
        let coin_amount = field_decimal(&decoded, "coin_amount")?;
        let sol_amount = field_decimal(&decoded, "sol_amount")?;

        // 交易先于建币事件到达时为代币兜底建档，交易方记为创建者
        if !self.engine.ledger().coins.exists(&mint) {
            self.engine.ledger().users.get_or_create(&wallet);
            let placeholder = CoinCreation {
                mint_address: mint.clone(),
                name: PLACEHOLDER_TOKEN_NAME.to_string(),
                ticker: "UNKNOWN".to_string(),
                metadata_uri: None,
                authority: wallet.clone(),
                decimals: 9,
            };
            if let Ok(CreationOutcome::Created(_)) = self.engine.apply_coin_creation(signature, placeholder).await {
                info!("🧱 未知代币兜底建档: {}", mint);
            }
        }

        let new_trade = NewTrade {
            signature: signature.to_string(),
            wallet_address: wallet,
            coin_address: mint,
            trade_type,
            coin_amount,
            sol_amount,
        };
        match self.engine.apply_trade(new_trade, TradeOrigin::OnChain).await? {
            TradeOutcome::Applied(_) => {
                let event_type = match trade_type {
                    TradeType::Buy => "TokenBoughtEvent",
                    _ => "TokenSoldEvent",
                };
                self.broadcast(event_type, signature, &decoded);
                Ok(())
            }
            TradeOutcome::Duplicate => Ok(()),
        }
    }

    fn broadcast(&self, event_type: &'static str, signature: &str, decoded: &DecodedEvent) {
        let fields = serde_json::Value::Object(
            decoded
                .iter()
                .map(|(name, value)| {
                    let json = match value {
                        crate::parser::DecodedValue::U8(v) => serde_json::json!(v),
                        other => serde_json::json!(other.as_str()),
                    };
                    (name.to_string(), json)
                })
                .collect(),
        );
        let notification = EventBroadcast {
            event_type,
            signature: signature.to_string(),
            fields,
        };
        if let Err(e) = self.event_sender.send(notification) {
            debug!("广播{}失败，无活跃接收者: {}", event_type, e);
        }
    }
}

#[async_trait]
impl LogNotificationHandler for EventRouter {
    async fn on_transaction_logs(&self, signature: &str, logs: &[String]) {
        if let Err(e) = self.process_transaction_logs(signature, logs).await {
            warn!("⚠️ 处理交易{}失败: {}", signature, e);
        }
    }
}

fn field_str<'a>(decoded: &'a DecodedEvent, name: &str) -> Result<&'a str> {
    decoded
        .iter()
        .find(|(n, _)| *n == name)
        .and_then(|(_, v)| v.as_str())
        .ok_or_else(|| EventListenerError::EventParsing(format!("缺少字符串字段{}", name)))
}

fn field_u8(decoded: &DecodedEvent, name: &str) -> Result<u8> {
    decoded
        .iter()
        .find(|(n, _)| *n == name)
        .and_then(|(_, v)| v.as_u8())
        .ok_or_else(|| EventListenerError::EventParsing(format!("缺少u8字段{}", name)))
}

fn field_decimal(decoded: &DecodedEvent, name: &str) -> Result<Decimal> {
    let raw = field_str(decoded, name)?;
    Decimal::from_str(raw.trim())
        .map_err(|e| EventListenerError::EventParsing(format!("字段{}不是有效数值 {:?}: {}", name, raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{encode_event_data, DecodedValue, EventRegistry};
    use ledger::Ledger;
    use rust_decimal_macros::dec;

    fn router() -> EventRouter {
        EventRouter::new(Arc::new(ScoringEngine::new(Ledger::new())), 64)
    }

    fn pubkey(seed: u8) -> String {
        bs58::encode([seed; 32]).into_string()
    }

    fn creation_logs(mint: &str, authority: &str) -> Vec<String> {
        let registry = EventRegistry::new();
        let data_line = encode_event_data(
            registry.schema(EventKind::CreateToken),
            &[
                DecodedValue::String("Test Token".to_string()),
                DecodedValue::String("TEST".to_string()),
                DecodedValue::String("https://example.com/m.json".to_string()),
                DecodedValue::Pubkey(mint.to_string()),
                DecodedValue::Pubkey(pubkey(200)),
                DecodedValue::Pubkey(authority.to_string()),
                DecodedValue::U8(9),
            ],
        );
        vec![
            "Program log: Instruction: CreateToken".to_string(),
            "Program log: minting".to_string(),
            data_line,
        ]
    }

    fn trade_logs(kind: EventKind, mint: &str, wallet: &str, coin_amount: &str, sol_amount: &str) -> Vec<String> {
        let registry = EventRegistry::new();
        let data_line = encode_event_data(
            registry.schema(kind),
            &[
                DecodedValue::Pubkey(mint.to_string()),
                DecodedValue::Pubkey(wallet.to_string()),
                DecodedValue::String(coin_amount.to_string()),
                DecodedValue::String(sol_amount.to_string()),
            ],
        );
        vec![
            format!("Program log: Instruction: {}", kind.instruction_name()),
            data_line,
        ]
    }

    #[tokio::test]
    async fn test_creation_event_registers_coin() {
        let router = router();
        let (mint, dev) = (pubkey(1), pubkey(2));
        router.engine.ledger().users.register(&dev, "", "");

        let mut receiver = router.subscribe();
        router.process_transaction_logs("sig-1", &creation_logs(&mint, &dev)).await.unwrap();

        let coin = router.engine.ledger().coins.get(&mint).unwrap();
        assert_eq!(coin.ticker, "TEST");
        assert_eq!(coin.creator, dev);

        let notification = receiver.try_recv().unwrap();
        assert_eq!(notification.event_type, "TokenCreatedEvent");
        assert_eq!(notification.fields["decimals"], 9);
    }

    #[tokio::test]
    async fn test_creation_with_unknown_creator_is_dropped() {
        let router = router();
        let (mint, dev) = (pubkey(1), pubkey(2));

        router.process_transaction_logs("sig-1", &creation_logs(&mint, &dev)).await.unwrap();

        assert!(!router.engine.ledger().coins.exists(&mint));
        assert!(router.engine.ledger().users.get(&dev).is_none());
    }

    #[tokio::test]
    async fn test_buy_event_applies_trade() {
        let router = router();
        let (mint, dev, buyer) = (pubkey(1), pubkey(2), pubkey(3));
        router.engine.ledger().users.register(&dev, "", "");
        router.process_transaction_logs("sig-1", &creation_logs(&mint, &dev)).await.unwrap();

        let logs = trade_logs(EventKind::BuyTokens, &mint, &buyer, "1000", "5.5");
        router.process_transaction_logs("sig-2", &logs).await.unwrap();

        assert_eq!(router.engine.ledger().holdings.amount_held(&buyer, &mint), dec!(1000));
        let trades = router.engine.ledger().trades.trades_by_user(&buyer);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].sol_amount, dec!(5.5));
    }

    #[tokio::test]
    async fn test_trade_on_unknown_coin_creates_placeholder() {
        let router = router();
        let (mint, buyer) = (pubkey(1), pubkey(3));

        let logs = trade_logs(EventKind::BuyTokens, &mint, &buyer, "10", "1");
        router.process_transaction_logs("sig-1", &logs).await.unwrap();

        let coin = router.engine.ledger().coins.get(&mint).unwrap();
        assert_eq!(coin.name, PLACEHOLDER_TOKEN_NAME);
        assert_eq!(coin.creator, buyer);
        assert_eq!(router.engine.ledger().holdings.amount_held(&buyer, &mint), dec!(10));
    }

    #[tokio::test]
    async fn test_sell_event_reduces_holding() {
        let router = router();
        let (mint, seller) = (pubkey(1), pubkey(3));
        router
            .process_transaction_logs("sig-1", &trade_logs(EventKind::BuyTokens, &mint, &seller, "100", "1"))
            .await
            .unwrap();
        router
            .process_transaction_logs("sig-2", &trade_logs(EventKind::SellTokens, &mint, &seller, "40", "0.4"))
            .await
            .unwrap();

        assert_eq!(router.engine.ledger().holdings.amount_held(&seller, &mint), dec!(60));
    }

    #[tokio::test]
    async fn test_unregistered_instruction_is_noop() {
        let router = router();
        let logs = vec![
            "Program log: Instruction: Initialize".to_string(),
            "Program log: done".to_string(),
        ];
        router.process_transaction_logs("sig-1", &logs).await.unwrap();
        assert_eq!(router.engine.ledger().trades.count(), 0);
    }

    #[tokio::test]
    async fn test_replayed_signature_is_skipped() {
        let router = router();
        let (mint, buyer) = (pubkey(1), pubkey(3));
        let logs = trade_logs(EventKind::BuyTokens, &mint, &buyer, "10", "1");

        router.process_transaction_logs("sig-1", &logs).await.unwrap();
        router.process_transaction_logs("sig-1", &logs).await.unwrap();

        assert_eq!(router.engine.ledger().trades.count(), 1);
        assert_eq!(router.engine.ledger().holdings.amount_held(&buyer, &mint), dec!(10));
    }

    #[tokio::test]
    async fn test_failed_notification_is_not_blacklisted() {
        let router = router();
        let (mint, buyer) = (pubkey(1), pubkey(3));

        let bad = trade_logs(EventKind::BuyTokens, &mint, &buyer, "not-a-number", "1");
        assert!(router.process_transaction_logs("sig-1", &bad).await.is_err());

        // 失败的签名未被记入缓存，重投可以成功
        let good = trade_logs(EventKind::BuyTokens, &mint, &buyer, "10", "1");
        router.process_transaction_logs("sig-1", &good).await.unwrap();
        assert_eq!(router.engine.ledger().trades.count(), 1);
        assert_eq!(router.engine.ledger().holdings.amount_held(&buyer, &mint), dec!(10));
    }

    #[tokio::test]
    async fn test_pruned_signature_replay_stays_idempotent() {
        let router = router();
        let (mint, buyer) = (pubkey(1), pubkey(3));
        let logs = trade_logs(EventKind::BuyTokens, &mint, &buyer, "10", "1");
        router.process_transaction_logs("sig-1", &logs).await.unwrap();

        assert_eq!(router.prune_signature_cache(Duration::ZERO), 1);

        // 缓存清空后重放同一签名，由账本侧签名去重兜底
        router.process_transaction_logs("sig-1", &logs).await.unwrap();
        assert_eq!(router.engine.ledger().trades.count(), 1);
        assert_eq!(router.engine.ledger().holdings.amount_held(&buyer, &mint), dec!(10));
    }

    #[tokio::test]
    async fn test_malformed_amount_is_dropped() {
        let router = router();
        let (mint, buyer) = (pubkey(1), pubkey(3));
        let logs = trade_logs(EventKind::BuyTokens, &mint, &buyer, "not-a-number", "1");

        let err = router.process_transaction_logs("sig-1", &logs).await.unwrap_err();
        assert!(matches!(err, EventListenerError::EventParsing(_)));
        assert_eq!(router.engine.ledger().trades.count(), 0);
    }

    #[tokio::test]
    async fn test_instruction_without_payload_is_noop() {
        let router = router();
        let logs = vec!["Program log: Instruction: BuyTokens".to_string()];
        router.process_transaction_logs("sig-1", &logs).await.unwrap();
        assert_eq!(router.engine.ledger().trades.count(), 0);
    }
}
