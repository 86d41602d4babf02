use crate::error::Result;
use crate::parser::schema_decoder::{DecodedEvent, EventSchema, FieldType};

/// 监听的链上事件类型(封闭集合)
///
/// 每个事件绑定一条指令名与一个载荷schema。集合外的指令与
/// discriminator一律静默跳过，不做动态注册。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CreateToken,
    BuyTokens,
    SellTokens,
}

const TOKEN_CREATED_FIELDS: &[(&str, FieldType)] = &[
    ("token_name", FieldType::String),
    ("token_symbol", FieldType::String),
    ("token_uri", FieldType::String),
    ("mint_address", FieldType::Pubkey),
    ("metadata_address", FieldType::Pubkey),
    ("authority", FieldType::Pubkey),
    ("decimals", FieldType::U8),
];

const TOKEN_BOUGHT_FIELDS: &[(&str, FieldType)] = &[
    ("mint_address", FieldType::Pubkey),
    ("buyer", FieldType::Pubkey),
    ("coin_amount", FieldType::String),
    ("sol_amount", FieldType::String),
];

const TOKEN_SOLD_FIELDS: &[(&str, FieldType)] = &[
    ("mint_address", FieldType::Pubkey),
    ("seller", FieldType::Pubkey),
    ("coin_amount", FieldType::String),
    ("sol_amount", FieldType::String),
];

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::CreateToken, EventKind::BuyTokens, EventKind::SellTokens];

    /// 指令日志中出现的指令名
    pub fn instruction_name(&self) -> &'static str {
        match self {
            EventKind::CreateToken => "CreateToken",
            EventKind::BuyTokens => "BuyTokens",
            EventKind::SellTokens => "SellTokens",
        }
    }

    /// 载荷事件名(discriminator的派生源)
    pub fn event_name(&self) -> &'static str {
        match self {
            EventKind::CreateToken => "TokenCreatedEvent",
            EventKind::BuyTokens => "TokenBoughtEvent",
            EventKind::SellTokens => "TokenSoldEvent",
        }
    }

    fn fields(&self) -> &'static [(&'static str, FieldType)] {
        match self {
            EventKind::CreateToken => TOKEN_CREATED_FIELDS,
            EventKind::BuyTokens => TOKEN_BOUGHT_FIELDS,
            EventKind::SellTokens => TOKEN_SOLD_FIELDS,
        }
    }
}

/// 事件schema注册表
///
/// schema在构造时一次性建好(含discriminator派生)，之后只读。
pub struct EventRegistry {
    schemas: Vec<(EventKind, EventSchema)>,
}

impl EventRegistry {
    pub fn new() -> Self {
        let schemas = EventKind::ALL
            .iter()
            .map(|kind| (*kind, EventSchema::new(kind.event_name(), kind.fields())))
            .collect();
        Self { schemas }
    }

    /// 按指令名查找事件类型，未注册的指令返回None
    pub fn kind_for_instruction(&self, instruction: &str) -> Option<EventKind> {
        EventKind::ALL.iter().copied().find(|k| k.instruction_name() == instruction)
    }

    pub fn schema(&self, kind: EventKind) -> &EventSchema {
        // 注册表按ALL构造，每个kind必有一条
        &self.schemas[EventKind::ALL.iter().position(|k| *k == kind).unwrap_or(0)].1
    }

    /// 用指定事件的schema尝试解码一行日志
    pub fn decode_log_line(&self, kind: EventKind, log_line: &str) -> Result<Option<DecodedEvent>> {
        self.schema(kind).decode_log_line(log_line)
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::schema_decoder::{encode_event_data, DecodedValue};

    #[test]
    fn test_instruction_routing() {
        let registry = EventRegistry::new();
        assert_eq!(registry.kind_for_instruction("CreateToken"), Some(EventKind::CreateToken));
        assert_eq!(registry.kind_for_instruction("BuyTokens"), Some(EventKind::BuyTokens));
        assert_eq!(registry.kind_for_instruction("SellTokens"), Some(EventKind::SellTokens));
        assert_eq!(registry.kind_for_instruction("Initialize"), None);
    }

    #[test]
    fn test_schemas_have_distinct_discriminators() {
        let registry = EventRegistry::new();
        let create = registry.schema(EventKind::CreateToken).discriminator();
        let buy = registry.schema(EventKind::BuyTokens).discriminator();
        let sell = registry.schema(EventKind::SellTokens).discriminator();
        assert_ne!(create, buy);
        assert_ne!(buy, sell);
        assert_ne!(create, sell);
    }

    #[test]
    fn test_buy_payload_decodes_with_buy_schema_only() {
        let registry = EventRegistry::new();
        let line = encode_event_data(
            registry.schema(EventKind::BuyTokens),
            &[
                DecodedValue::Pubkey(bs58::encode([1u8; 32]).into_string()),
                DecodedValue::Pubkey(bs58::encode([2u8; 32]).into_string()),
                DecodedValue::String("1000".to_string()),
                DecodedValue::String("5.5".to_string()),
            ],
        );

        let decoded = registry.decode_log_line(EventKind::BuyTokens, &line).unwrap().unwrap();
        assert_eq!(decoded[2], ("coin_amount", DecodedValue::String("1000".to_string())));
        // 其他事件的schema解码同一行必须明确拒绝
        assert!(registry.decode_log_line(EventKind::SellTokens, &line).is_err());
    }
}
