use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::dsl::count_star;
use diesel::prelude::{Insertable, Queryable, Selectable};
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl, SelectableHelper};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::integration::db;
use crate::schema::notifications;
use crate::user;

use super::model::Notification;
use super::{Id, Kind};

#[async_trait]
pub trait NotificationRepository {
    async fn insert(&self, n: &Notification) -> super::Result<()>;

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Notification>>;

    /// Newest first.
    async fn find_by_recipient(&self, recipient: &user::Sub) -> super::Result<Vec<Notification>>;

    async fn count_unread(&self, recipient: &user::Sub) -> super::Result<usize>;

    async fn mark_read(&self, id: &Id) -> super::Result<()>;

    async fn mark_all_read(&self, recipient: &user::Sub) -> super::Result<usize>;
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct NotificationRow {
    id: Uuid,
    recipient: String,
    title: String,
    message: String,
    kind: String,
    link: Option<String>,
    is_read: bool,
    created_at: NaiveDateTime,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = super::Error;

    fn try_from(r: NotificationRow) -> super::Result<Self> {
        Ok(Notification::restore(
            Id::from(r.id),
            user::Sub::from(r.recipient),
            r.title,
            r.message,
            Kind::from_str(&r.kind)?,
            r.link,
            r.is_read,
            r.created_at.and_utc(),
        ))
    }
}

#[derive(Insertable)]
#[diesel(table_name = notifications)]
struct NewNotificationRow<'a> {
    id: Uuid,
    recipient: &'a str,
    title: &'a str,
    message: &'a str,
    kind: &'a str,
    link: Option<&'a str>,
    is_read: bool,
    created_at: NaiveDateTime,
}

impl<'a> From<&'a Notification> for NewNotificationRow<'a> {
    fn from(n: &'a Notification) -> Self {
        Self {
            id: *n.id().get(),
            recipient: n.recipient().as_str(),
            title: n.title(),
            message: n.message(),
            kind: n.kind().as_str(),
            link: n.link(),
            is_read: n.is_read(),
            created_at: n.created_at().naive_utc(),
        }
    }
}

pub struct PgNotificationRepository {
    pool: db::Pool,
}

impl PgNotificationRepository {
    pub fn new(pool: db::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, n: &Notification) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        diesel::insert_into(notifications::table)
            .values(NewNotificationRow::from(n))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Notification>> {
        let mut conn = self.pool.get()?;

        notifications::table
            .find(id.get())
            .select(NotificationRow::as_select())
            .first::<NotificationRow>(&mut conn)
            .optional()?
            .map(Notification::try_from)
            .transpose()
    }

    async fn find_by_recipient(&self, recipient: &user::Sub) -> super::Result<Vec<Notification>> {
        let mut conn = self.pool.get()?;

        notifications::table
            .filter(notifications::recipient.eq(recipient.as_str()))
            .order((notifications::created_at.desc(), notifications::seq.desc()))
            .select(NotificationRow::as_select())
            .load::<NotificationRow>(&mut conn)?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    async fn count_unread(&self, recipient: &user::Sub) -> super::Result<usize> {
        let mut conn = self.pool.get()?;

        let count = notifications::table
            .filter(notifications::recipient.eq(recipient.as_str()))
            .filter(notifications::is_read.eq(false))
            .select(count_star())
            .first::<i64>(&mut conn)?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn mark_read(&self, id: &Id) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(notifications::table.find(id.get()))
            .set(notifications::is_read.eq(true))
            .execute(&mut conn)?;

        if updated == 0 {
            return Err(super::Error::NotFound(*id));
        }
        Ok(())
    }

    async fn mark_all_read(&self, recipient: &user::Sub) -> super::Result<usize> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(
            notifications::table
                .filter(notifications::recipient.eq(recipient.as_str()))
                .filter(notifications::is_read.eq(false)),
        )
        .set(notifications::is_read.eq(true))
        .execute(&mut conn)?;

        Ok(updated)
    }
}

/// Append-ordered in-memory store.
#[derive(Default)]
pub struct InMemoryNotificationRepository {
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, n: &Notification) -> super::Result<()> {
        self.notifications.write().await.push(n.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Notification>> {
        let notifications = self.notifications.read().await;
        Ok(notifications.iter().find(|n| n.id().eq(id)).cloned())
    }

    async fn find_by_recipient(&self, recipient: &user::Sub) -> super::Result<Vec<Notification>> {
        let notifications = self.notifications.read().await;

        let mut found = notifications
            .iter()
            .rev()
            .filter(|n| n.recipient().eq(recipient))
            .cloned()
            .collect::<Vec<_>>();
        // stable: equal timestamps keep newest-appended first
        found.sort_by(|a, b| b.created_at().cmp(a.created_at()));

        Ok(found)
    }

    async fn count_unread(&self, recipient: &user::Sub) -> super::Result<usize> {
        let notifications = self.notifications.read().await;
        Ok(notifications
            .iter()
            .filter(|n| n.recipient().eq(recipient) && !n.is_read())
            .count())
    }

    async fn mark_read(&self, id: &Id) -> super::Result<()> {
        let mut notifications = self.notifications.write().await;
        let n = notifications
            .iter_mut()
            .find(|n| n.id().eq(id))
            .ok_or(super::Error::NotFound(*id))?;
        n.mark_read();
        Ok(())
    }

    async fn mark_all_read(&self, recipient: &user::Sub) -> super::Result<usize> {
        let mut notifications = self.notifications.write().await;

        let mut updated = 0;
        for n in notifications
            .iter_mut()
            .filter(|n| n.recipient().eq(recipient) && !n.is_read())
        {
            n.mark_read();
            updated += 1;
        }

        Ok(updated)
    }
}
