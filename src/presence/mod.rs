//! Who is online right now.
//!
//! The registry maps a user to the single connection that currently speaks for
//! them. A reconnect replaces the previous mapping (last connect wins), and a
//! disconnect only removes the mapping it created, so a late disconnect of an
//! old socket cannot knock a fresh one offline.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::sync::Arc;

use log::debug;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::{event, user};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Write side of one realtime connection.
#[derive(Clone, Debug)]
pub struct Handle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<event::Event>,
}

impl Handle {
    pub fn new(tx: mpsc::UnboundedSender<event::Event>) -> Self {
        Self {
            id: ConnectionId::random(),
            tx,
        }
    }

    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Best effort: returns `false` when the connection is already gone.
    pub fn send(&self, e: event::Event) -> bool {
        self.tx.send(e).is_ok()
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Handle {}

#[derive(Clone, Default)]
pub struct Registry {
    online: Arc<RwLock<HashMap<user::Sub, Handle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, sub: user::Sub, handle: Handle) {
        let mut online = self.online.write().await;
        if let Some(prev) = online.insert(sub.clone(), handle) {
            debug!("{sub} reconnected, dropping mapping to {}", prev.id());
        }
    }

    /// Removes the mapping only while it still points at `handle`.
    pub async fn unregister(&self, handle: &Handle) -> Option<user::Sub> {
        let mut online = self.online.write().await;

        let sub = online
            .iter()
            .find(|(_, h)| h.id() == handle.id())
            .map(|(sub, _)| sub.clone())?;

        online.remove(&sub);
        Some(sub)
    }

    pub async fn lookup(&self, sub: &user::Sub) -> Option<Handle> {
        self.online.read().await.get(sub).cloned()
    }

    pub async fn list_active(&self) -> BTreeSet<user::Sub> {
        self.online.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod test {
    use tokio::sync::mpsc;

    use super::*;

    fn handle() -> (Handle, mpsc::UnboundedReceiver<event::Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Handle::new(tx), rx)
    }

    #[tokio::test]
    async fn should_lookup_registered_handle() {
        let registry = Registry::new();
        let (h, _rx) = handle();
        let jora = user::Sub::from("jora");

        registry.register(jora.clone(), h.clone()).await;

        assert_eq!(registry.lookup(&jora).await, Some(h));
        assert!(registry.lookup(&user::Sub::from("valera")).await.is_none());
    }

    #[tokio::test]
    async fn should_let_last_connect_win() {
        let registry = Registry::new();
        let (h1, _rx1) = handle();
        let (h2, _rx2) = handle();
        let jora = user::Sub::from("jora");

        registry.register(jora.clone(), h1).await;
        registry.register(jora.clone(), h2.clone()).await;

        assert_eq!(registry.lookup(&jora).await, Some(h2));
    }

    #[tokio::test]
    async fn should_ignore_stale_unregister() {
        let registry = Registry::new();
        let (h1, _rx1) = handle();
        let (h2, _rx2) = handle();
        let jora = user::Sub::from("jora");

        registry.register(jora.clone(), h1.clone()).await;
        registry.register(jora.clone(), h2.clone()).await;

        assert_eq!(registry.unregister(&h1).await, None);
        assert_eq!(registry.lookup(&jora).await, Some(h2.clone()));

        assert_eq!(registry.unregister(&h2).await, Some(jora.clone()));
        assert!(registry.lookup(&jora).await.is_none());
    }

    #[tokio::test]
    async fn should_register_same_handle_idempotently() {
        let registry = Registry::new();
        let (h, _rx) = handle();
        let jora = user::Sub::from("jora");

        registry.register(jora.clone(), h.clone()).await;
        registry.register(jora.clone(), h.clone()).await;

        assert_eq!(registry.list_active().await.len(), 1);
        assert_eq!(registry.lookup(&jora).await, Some(h));
    }

    #[tokio::test]
    async fn should_list_active_users_sorted() {
        let registry = Registry::new();
        let (h1, _rx1) = handle();
        let (h2, _rx2) = handle();

        registry.register(user::Sub::from("valera"), h1).await;
        registry.register(user::Sub::from("jora"), h2).await;

        let active: Vec<_> = registry.list_active().await.into_iter().collect();
        assert_eq!(
            active,
            vec![user::Sub::from("jora"), user::Sub::from("valera")]
        );
    }

    #[test]
    fn should_report_closed_connection() {
        let (h, rx) = handle();
        drop(rx);

        assert!(!h.send(event::Event::ActiveUsers {
            users: BTreeSet::new()
        }));
    }
}
