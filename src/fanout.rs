//! Turns message appends and order transitions into stored notifications
//! and pushes them to recipients that are online.

use std::collections::BTreeSet;

use log::{debug, error, warn};

use crate::message::model::Message;
use crate::notification::{self, Kind, model::Notification};
use crate::{event, order, presence, user};

const CHAT_LINK: &str = "/chat";

#[derive(Clone)]
pub struct Coordinator {
    presence: presence::Registry,
    notification_service: notification::Service,
    user_service: user::Service,
}

impl Coordinator {
    pub fn new(
        presence: presence::Registry,
        notification_service: notification::Service,
        user_service: user::Service,
    ) -> Self {
        Self {
            presence,
            notification_service,
            user_service,
        }
    }
}

impl Coordinator {
    /// `members` is the room membership read before the append.
    pub async fn message_appended(
        &self,
        members: &BTreeSet<user::Sub>,
        message: &Message,
    ) -> Vec<Notification> {
        let sender = message.sender();
        let from = self.display_name(sender).await;
        let body = format!("You have a new message from {from}");

        let mut created = Vec::with_capacity(members.len().saturating_sub(1));
        for recipient in members.iter().filter(|m| *m != sender) {
            match self
                .notification_service
                .create(
                    recipient,
                    "New message",
                    &body,
                    Kind::NewMessage,
                    Some(CHAT_LINK.to_owned()),
                )
                .await
            {
                Ok(n) => {
                    self.push(&n).await;
                    created.push(n);
                }
                Err(e) => error!("failed to notify {recipient} about {}: {e:?}", message.id()),
            }
        }

        created
    }

    /// Returns `None` when the actor is the recipient.
    pub async fn order_transitioned(
        &self,
        e: &order::Event,
    ) -> notification::Result<Option<Notification>> {
        if e.is_self_inflicted() {
            debug!("skipping {:?} of order {}: actor is the recipient", e.kind(), e.order_id());
            return Ok(None);
        }

        let (kind, title, body) = e.describe();
        let n = self
            .notification_service
            .create(e.recipient(), title, &body, kind, Some(e.link()))
            .await?;

        self.push(&n).await;
        Ok(Some(n))
    }
}

impl Coordinator {
    async fn display_name(&self, sub: &user::Sub) -> String {
        match self.user_service.find_user_info(sub).await {
            Ok(info) => info.email().to_owned(),
            Err(e) => {
                debug!("falling back to id of {sub}: {e}");
                sub.to_string()
            }
        }
    }

    async fn push(&self, n: &Notification) {
        let Some(handle) = self.presence.lookup(n.recipient()).await else {
            return;
        };

        let pushed = handle.send(event::Event::NotificationPushed {
            notification: n.clone(),
        });
        if !pushed {
            warn!("{} went offline before {} was pushed", n.recipient(), n.id());
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::notification::repository::{
        InMemoryNotificationRepository, NotificationRepository,
    };
    use crate::notification::service::NotificationServiceImpl;
    use crate::notification::{Id, model::Notification};
    use crate::presence::Handle;
    use crate::room;
    use crate::user::model::User;
    use crate::user::repository::InMemoryUserRepository;
    use crate::user::service::UserServiceImpl;

    use super::*;

    fn sub(s: &str) -> user::Sub {
        user::Sub::from(s)
    }

    async fn coordinator(
        notifications: notification::Repository,
    ) -> (Coordinator, presence::Registry) {
        let users = InMemoryUserRepository::new();
        users
            .insert(sub("jora"), User::new(&sub("jora"), "Jora", "jora@shop.io"))
            .await;

        let presence = presence::Registry::new();
        let c = Coordinator::new(
            presence.clone(),
            Arc::new(NotificationServiceImpl::new(notifications)),
            Arc::new(UserServiceImpl::new(Arc::new(users))),
        );
        (c, presence)
    }

    fn message(sender: &str) -> Message {
        crate::message::model::NewMessage::try_new(room::Id::random(), sub(sender), "hi")
            .unwrap()
            .into_message(chrono::Utc::now(), None)
    }

    fn order_event(value: serde_json::Value) -> order::Event {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn should_notify_members_except_sender() {
        let (c, _) = coordinator(Arc::new(InMemoryNotificationRepository::new())).await;
        let members = BTreeSet::from([sub("jora"), sub("valera"), sub("igor")]);

        let created = c.message_appended(&members, &message("jora")).await;

        let recipients = created
            .iter()
            .map(|n| n.recipient().clone())
            .collect::<BTreeSet<_>>();
        assert_eq!(recipients, BTreeSet::from([sub("igor"), sub("valera")]));
        for n in &created {
            assert_eq!(n.title(), "New message");
            assert_eq!(n.message(), "You have a new message from jora@shop.io");
            assert_eq!(n.link(), Some("/chat"));
        }
    }

    #[tokio::test]
    async fn should_fall_back_to_sender_id() {
        let (c, _) = coordinator(Arc::new(InMemoryNotificationRepository::new())).await;
        let members = BTreeSet::from([sub("jora"), sub("valera")]);

        let created = c.message_appended(&members, &message("valera")).await;
        assert_eq!(created[0].message(), "You have a new message from valera");
    }

    #[tokio::test]
    async fn should_push_to_online_recipient_only() {
        let (c, presence) = coordinator(Arc::new(InMemoryNotificationRepository::new())).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        presence.register(sub("valera"), Handle::new(tx)).await;

        let members = BTreeSet::from([sub("jora"), sub("valera"), sub("igor")]);
        let created = c.message_appended(&members, &message("jora")).await;
        assert_eq!(created.len(), 2);

        match rx.try_recv() {
            Ok(event::Event::NotificationPushed { notification }) => {
                assert_eq!(notification.recipient(), &sub("valera"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_swallow_push_to_closed_connection() {
        let (c, presence) = coordinator(Arc::new(InMemoryNotificationRepository::new())).await;
        let (tx, rx) = mpsc::unbounded_channel();
        presence.register(sub("valera"), Handle::new(tx)).await;
        drop(rx);

        let members = BTreeSet::from([sub("jora"), sub("valera")]);
        assert_eq!(c.message_appended(&members, &message("jora")).await.len(), 1);
    }

    /// Rejects writes for a single recipient.
    struct FlakyRepository {
        inner: InMemoryNotificationRepository,
        broken: user::Sub,
    }

    #[async_trait]
    impl NotificationRepository for FlakyRepository {
        async fn insert(&self, n: &Notification) -> notification::Result<()> {
            if n.recipient().eq(&self.broken) {
                return Err(notification::Error::_Diesel(
                    diesel::result::Error::BrokenTransactionManager,
                ));
            }
            self.inner.insert(n).await
        }

        async fn find_by_id(&self, id: &Id) -> notification::Result<Option<Notification>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_recipient(
            &self,
            recipient: &user::Sub,
        ) -> notification::Result<Vec<Notification>> {
            self.inner.find_by_recipient(recipient).await
        }

        async fn count_unread(&self, recipient: &user::Sub) -> notification::Result<usize> {
            self.inner.count_unread(recipient).await
        }

        async fn mark_read(&self, id: &Id) -> notification::Result<()> {
            self.inner.mark_read(id).await
        }

        async fn mark_all_read(&self, recipient: &user::Sub) -> notification::Result<usize> {
            self.inner.mark_all_read(recipient).await
        }
    }

    #[tokio::test]
    async fn should_continue_after_store_failure() {
        let repo = FlakyRepository {
            inner: InMemoryNotificationRepository::new(),
            broken: sub("igor"),
        };
        let (c, _) = coordinator(Arc::new(repo)).await;
        let members = BTreeSet::from([sub("jora"), sub("valera"), sub("igor")]);

        let created = c.message_appended(&members, &message("jora")).await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].recipient(), &sub("valera"));
    }

    #[tokio::test]
    async fn should_surface_store_failure_for_orders() {
        let repo = FlakyRepository {
            inner: InMemoryNotificationRepository::new(),
            broken: sub("valera"),
        };
        let (c, _) = coordinator(Arc::new(repo)).await;

        let res = c
            .order_transitioned(&order_event(serde_json::json!({
                "order_id": "42",
                "recipient": "valera",
                "kind": "paid"
            })))
            .await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn should_skip_order_event_caused_by_recipient() {
        let (c, _) = coordinator(Arc::new(InMemoryNotificationRepository::new())).await;

        let res = c
            .order_transitioned(&order_event(serde_json::json!({
                "order_id": "42",
                "recipient": "valera",
                "actor": "valera",
                "kind": "created"
            })))
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn should_notify_seller_about_new_order() {
        let (c, presence) = coordinator(Arc::new(InMemoryNotificationRepository::new())).await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        presence.register(sub("valera"), Handle::new(tx)).await;

        let n = c
            .order_transitioned(&order_event(serde_json::json!({
                "order_id": "42",
                "recipient": "valera",
                "actor": "jora",
                "kind": "created"
            })))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(n.kind(), &Kind::OrderNew);
        assert_eq!(n.title(), "New order");
        assert_eq!(n.message(), "You have a new order #42");
        assert_eq!(n.link(), Some("/order/42"));
        assert!(matches!(
            rx.try_recv(),
            Ok(event::Event::NotificationPushed { .. })
        ));
    }
}
