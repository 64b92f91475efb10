use async_trait::async_trait;
use log::{debug, warn};

use crate::user;

use super::model::Notification;
use super::{Id, Kind, Repository};

#[async_trait]
pub trait NotificationService {
    async fn create(
        &self,
        recipient: &user::Sub,
        title: &str,
        message: &str,
        kind: Kind,
        link: Option<String>,
    ) -> super::Result<Notification>;

    async fn list_for_user(&self, recipient: &user::Sub) -> super::Result<Vec<Notification>>;

    async fn count_unread(&self, recipient: &user::Sub) -> super::Result<usize>;

    async fn mark_read(&self, id: &Id, requester: &user::Sub) -> super::Result<()>;

    async fn mark_all_read(&self, recipient: &user::Sub) -> super::Result<usize>;
}

#[derive(Clone)]
pub struct NotificationServiceImpl {
    repo: Repository,
}

impl NotificationServiceImpl {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl NotificationService for NotificationServiceImpl {
    async fn create(
        &self,
        recipient: &user::Sub,
        title: &str,
        message: &str,
        kind: Kind,
        link: Option<String>,
    ) -> super::Result<Notification> {
        let n = Notification::new(recipient.clone(), title, message, kind, link);
        self.repo.insert(&n).await?;
        debug!("{} notification {} stored for {recipient}", n.kind().as_str(), n.id());
        Ok(n)
    }

    async fn list_for_user(&self, recipient: &user::Sub) -> super::Result<Vec<Notification>> {
        self.repo.find_by_recipient(recipient).await
    }

    async fn count_unread(&self, recipient: &user::Sub) -> super::Result<usize> {
        self.repo.count_unread(recipient).await
    }

    async fn mark_read(&self, id: &Id, requester: &user::Sub) -> super::Result<()> {
        let n = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(super::Error::NotFound(*id))?;

        if n.recipient().ne(requester) {
            warn!("{requester} tried to mark foreign notification {id} as read");
            return Err(super::Error::Forbidden(*id));
        }

        if n.is_read() {
            return Ok(());
        }
        self.repo.mark_read(id).await
    }

    async fn mark_all_read(&self, recipient: &user::Sub) -> super::Result<usize> {
        self.repo.mark_all_read(recipient).await
    }
}
