use super::model::User;
use dashmap::DashMap;
use tracing::info;

/// 用户数据操作接口
#[derive(Debug, Default)]
pub struct UserRepository {
    users: DashMap<String, User>,
}

impl UserRepository {
    /// 显式注册用户(REST写入路径)
    ///
    /// 地址仅做trim，不做大小写归一: base58地址区分大小写。
    pub fn register(&self, wallet_address: &str, display_name: &str, bio: &str) -> User {
        let address = wallet_address.trim().to_string();
        let mut user = self
            .users
            .entry(address.clone())
            .or_insert_with(|| User::new(address.clone()))
            .clone();

        if !display_name.is_empty() || !bio.is_empty() {
            user.display_name = display_name.to_string();
            user.bio = bio.to_string();
            self.users.insert(address, user.clone());
        }
        user
    }

    /// 获取或创建用户(首次被链上事件观察到时)
    pub fn get_or_create(&self, wallet_address: &str) -> User {
        let created = !self.users.contains_key(wallet_address);
        let user = self
            .users
            .entry(wallet_address.to_string())
            .or_insert_with(|| User::new(wallet_address))
            .clone();
        if created {
            info!("👤 新用户: {}", wallet_address);
        }
        user
    }

    pub fn get(&self, wallet_address: &str) -> Option<User> {
        self.users.get(wallet_address).map(|u| u.clone())
    }

    pub fn exists(&self, wallet_address: &str) -> bool {
        self.users.contains_key(wallet_address)
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }

    /// 全部钱包地址(评分初始化用)
    pub fn all_addresses(&self) -> Vec<String> {
        self.users.iter().map(|u| u.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_keeps_address_verbatim() {
        let repo = UserRepository::default();
        let user = repo.register("  9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin ", "bob", "");
        assert_eq!(user.wallet_address, "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin");
        assert_eq!(user.display_name, "bob");
        assert!(repo.exists("9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"));
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let repo = UserRepository::default();
        repo.get_or_create("wallet-1");
        repo.get_or_create("wallet-1");
        assert_eq!(repo.count(), 1);
    }
}
