use super::model::UserInfo;
use super::{Repository, Sub};

#[async_trait::async_trait]
pub trait UserService {
    async fn find_user_info(&self, sub: &Sub) -> super::Result<UserInfo>;
}

#[derive(Clone)]
pub struct UserServiceImpl {
    repo: Repository,
}

impl UserServiceImpl {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait::async_trait]
impl UserService for UserServiceImpl {
    async fn find_user_info(&self, sub: &Sub) -> super::Result<UserInfo> {
        self.repo
            .find_by_sub(sub)
            .await?
            .map(UserInfo::from)
            .ok_or_else(|| super::Error::NotFound(sub.to_owned()))
    }
}
