//! # Origin Repository
//!
//! The slow source of truth the cache sits in front of. The service only needs
//! [`UserRepository`]; [`InMemoryUserRepository`] is the bundled origin.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::core::error::ServiceResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u32,
    pub name: String,
}

impl User {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Source of user records
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Load every user
    async fn get_users(&self) -> ServiceResult<Vec<User>>;
}

/// Fixed user list held in memory
pub struct InMemoryUserRepository {
    users: Vec<User>,
    loads: AtomicU64,
}

impl InMemoryUserRepository {
    pub fn new(users: Vec<User>) -> Self {
        Self {
            users,
            loads: AtomicU64::new(0),
        }
    }

    /// Number of times `get_users` has been called
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new(vec![User::new(1, "User1"), User::new(2, "User2")])
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_users(&self) -> ServiceResult<Vec<User>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        debug!("Loading {} users from origin", self.users.len());
        Ok(self.users.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_repository_is_seeded() {
        let repository = InMemoryUserRepository::default();
        let users = repository.get_users().await.unwrap();

        assert_eq!(users, vec![User::new(1, "User1"), User::new(2, "User2")]);
        assert_eq!(repository.load_count(), 1);
    }

    #[test]
    fn test_user_wire_format() {
        let json = serde_json::to_value(User::new(7, "Ada")).unwrap();
        assert_eq!(json, serde_json::json!({"id": 7, "name": "Ada"}));
    }
}
