use std::collections::HashMap;

use async_trait::async_trait;
use diesel::{OptionalExtension, QueryDsl, RunQueryDsl, SelectableHelper};
use tokio::sync::RwLock;

use crate::integration::db;
use crate::schema::users;

use super::Sub;
use super::model::User;

#[async_trait]
pub trait UserRepository {
    async fn find_by_sub(&self, sub: &Sub) -> super::Result<Option<User>>;
}

pub struct PgUserRepository {
    pool: db::Pool,
}

impl PgUserRepository {
    pub fn new(pool: db::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_sub(&self, s: &Sub) -> super::Result<Option<User>> {
        let mut conn = self.pool.get()?;

        let u = users::table
            .find(s.as_str())
            .select(User::as_select())
            .first(&mut conn)
            .optional()?;

        Ok(u)
    }
}

/// Users known to a single process. Used when the service runs without Postgres.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Sub, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, sub: Sub, user: User) {
        self.users.write().await.insert(sub, user);
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_sub(&self, sub: &Sub) -> super::Result<Option<User>> {
        Ok(self.users.read().await.get(sub).cloned())
    }
}

#[cfg(test)]
mod test {
    use diesel::RunQueryDsl;
    use testcontainers_modules::{postgres::Postgres, testcontainers::runners::AsyncRunner};

    use crate::integration::db;
    use crate::schema::users;
    use crate::user::model::{User, UserInfo};

    use super::*;

    #[tokio::test]
    async fn should_find_in_memory_user() {
        let repo = InMemoryUserRepository::new();
        let jora = Sub::from("jora");
        repo.insert(jora.clone(), User::new(&jora, "Jora", "jora@shop.io"))
            .await;

        let found = repo.find_by_sub(&jora).await.unwrap().map(UserInfo::from);
        assert_eq!(found.unwrap().email(), "jora@shop.io");

        let missing = repo.find_by_sub(&Sub::from("valera")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    #[ignore = "requires a docker daemon"]
    async fn should_find_pg_user() {
        let node = Postgres::default().start().await.unwrap();
        let pool = db::test_pool(&node).await;

        let jora = Sub::from("jora");
        diesel::insert_into(users::table)
            .values(&User::new(&jora, "Jora", "jora@shop.io"))
            .execute(&mut pool.get().unwrap())
            .unwrap();

        let repo = PgUserRepository::new(pool);
        let found = repo.find_by_sub(&jora).await.unwrap().map(UserInfo::from);
        assert_eq!(found.unwrap().name(), "Jora");

        assert!(repo.find_by_sub(&Sub::from("valera")).await.unwrap().is_none());
    }
}
