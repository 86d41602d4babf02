use crate::error::{EventListenerError, Result};
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use tracing::debug;

/// 事件载荷所在日志行的前缀标记
pub const PROGRAM_DATA_MARKER: &str = "Program data: ";

/// schema中支持的字段类型
///
/// 载荷为定长/长度前缀的紧凑布局:
/// - String: u32小端长度前缀 + UTF-8字节
/// - Pubkey: 32字节原始公钥，解码为base58字符串
/// - U8: 单字节
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Pubkey,
    U8,
}

/// 解码后的字段值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    String(String),
    Pubkey(String),
    U8(u8),
}

impl DecodedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DecodedValue::String(s) | DecodedValue::Pubkey(s) => Some(s),
            DecodedValue::U8(_) => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            DecodedValue::U8(v) => Some(*v),
            _ => None,
        }
    }
}

/// 事件schema: 事件名 + 有序字段列表
///
/// discriminator在构造时由事件名派生，与Anchor事件编码一致:
/// sha256("event:" + 事件名)的前8字节。
#[derive(Debug, Clone)]
pub struct EventSchema {
    pub name: &'static str,
    pub fields: &'static [(&'static str, FieldType)],
    discriminator: [u8; 8],
}

/// 解码结果，保持schema声明的字段顺序
pub type DecodedEvent = Vec<(&'static str, DecodedValue)>;

/// 从事件名计算discriminator
pub fn calculate_event_discriminator(event_name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(format!("event:{}", event_name).as_bytes());
    let hash = hasher.finalize();

    let mut discriminator = [0u8; 8];
    discriminator.copy_from_slice(&hash[..8]);
    discriminator
}

impl EventSchema {
    pub fn new(name: &'static str, fields: &'static [(&'static str, FieldType)]) -> Self {
        Self {
            name,
            fields,
            discriminator: calculate_event_discriminator(name),
        }
    }

    pub fn discriminator(&self) -> [u8; 8] {
        self.discriminator
    }

    /// 尝试按本schema解码一行交易日志
    ///
    /// - 行内无"Program data: "标记: Ok(None)，不是事件载荷行
    /// - discriminator与本schema不符: SchemaMismatch，绝不返回部分解码结果
    /// - discriminator匹配但载荷不完整: TruncatedPayload
    /// - 字段解码失败或有多余尾部字节: SchemaMismatch
    pub fn decode_log_line(&self, log_line: &str) -> Result<Option<DecodedEvent>> {
        let encoded = match log_line.find(PROGRAM_DATA_MARKER) {
            Some(pos) => &log_line[pos + PROGRAM_DATA_MARKER.len()..],
            None => return Ok(None),
        };

        let data = general_purpose::STANDARD.decode(encoded.trim())?;
        if data.len() < 8 {
            return Err(EventListenerError::SchemaMismatch {
                event: self.name,
                detail: format!("载荷只有{}字节，不足discriminator长度", data.len()),
            });
        }
        if data[..8] != self.discriminator {
            return Err(EventListenerError::SchemaMismatch {
                event: self.name,
                detail: format!("discriminator不匹配: {:02x?}", &data[..8]),
            });
        }

        let mut cursor = 8usize;
        let mut decoded = Vec::with_capacity(self.fields.len());

        for (field_name, field_type) in self.fields {
            let value = match field_type {
                FieldType::String => {
                    let len_bytes = Self::take(&data, &mut cursor, 4, self.name, field_name)?;
                    let len = u32::from_le_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
                    let raw = Self::take(&data, &mut cursor, len, self.name, field_name)?;
                    let text = std::str::from_utf8(raw).map_err(|e| EventListenerError::SchemaMismatch {
                        event: self.name,
                        detail: format!("字段{}不是有效UTF-8: {}", field_name, e),
                    })?;
                    DecodedValue::String(text.to_string())
                }
                FieldType::Pubkey => {
                    let raw = Self::take(&data, &mut cursor, 32, self.name, field_name)?;
                    DecodedValue::Pubkey(bs58::encode(raw).into_string())
                }
                FieldType::U8 => {
                    let raw = Self::take(&data, &mut cursor, 1, self.name, field_name)?;
                    DecodedValue::U8(raw[0])
                }
            };
            decoded.push((*field_name, value));
        }

        if cursor != data.len() {
            return Err(EventListenerError::SchemaMismatch {
                event: self.name,
                detail: format!("载荷尾部有{}个多余字节", data.len() - cursor),
            });
        }

        debug!("📡 事件{}解码成功，{}个字段", self.name, decoded.len());
        Ok(Some(decoded))
    }

    fn take<'a>(
        data: &'a [u8],
        cursor: &mut usize,
        len: usize,
        event: &'static str,
        field: &'static str,
    ) -> Result<&'a [u8]> {
        let end = cursor
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or(EventListenerError::TruncatedPayload { event, field })?;
        let slice = &data[*cursor..end];
        *cursor = end;
        Ok(slice)
    }
}

/// 按schema布局编码一条事件载荷日志行(测试与本地回放用)
pub fn encode_event_data(schema: &EventSchema, values: &[DecodedValue]) -> String {
    let mut data = Vec::new();
    data.extend_from_slice(&schema.discriminator());
    for value in values {
        match value {
            DecodedValue::String(s) => {
                data.extend_from_slice(&(s.len() as u32).to_le_bytes());
                data.extend_from_slice(s.as_bytes());
            }
            DecodedValue::Pubkey(s) => {
                let mut raw = [0u8; 32];
                let decoded = bs58::decode(s).into_vec().unwrap_or_default();
                let n = decoded.len().min(32);
                raw[32 - n..].copy_from_slice(&decoded[decoded.len() - n..]);
                data.extend_from_slice(&raw);
            }
            DecodedValue::U8(v) => data.push(*v),
        }
    }
    format!("{}{}", PROGRAM_DATA_MARKER, general_purpose::STANDARD.encode(data))
}
