use chrono::prelude::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 用户模型
///
/// 以钱包地址为主键。首次被观察到时创建(交易、建币或显式注册)，永不删除。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// 钱包地址(主键，base58原样保存)
    pub wallet_address: String,
    /// 展示名称
    pub display_name: String,
    /// 个人简介
    pub bio: String,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(wallet_address: impl Into<String>) -> Self {
        Self {
            wallet_address: wallet_address.into(),
            display_name: String::new(),
            bio: String::new(),
            created_at: Utc::now(),
        }
    }

    /// 有展示名称时返回展示名称，否则回退到钱包地址
    pub fn get_display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.wallet_address
        } else {
            &self.display_name
        }
    }
}
