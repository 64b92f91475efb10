use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use log::{debug, trace};
use tokio::sync::{RwLock, mpsc};

use crate::presence::{self, ConnectionId, Handle};
use crate::{room, user};

use super::context;
use super::model::{Command, Event};

pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

#[derive(Clone)]
pub struct EventService {
    presence: presence::Registry,
    room_service: room::Service,
    connections: Arc<RwLock<HashMap<ConnectionId, Handle>>>,
    channels: Arc<RwLock<HashMap<room::Id, HashSet<ConnectionId>>>>,
}

impl EventService {
    pub fn new(presence: presence::Registry, room_service: room::Service) -> Self {
        Self {
            presence,
            room_service,
            connections: Arc::new(RwLock::new(HashMap::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl EventService {
    /// Opens the outbound queue of a fresh connection authenticated as `owner`.
    pub async fn connect(&self, owner: user::Sub) -> (context::Ws, EventStream) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let handle = Handle::new(tx);

        self.connections
            .write()
            .await
            .insert(handle.id(), handle.clone());
        debug!("connection {} opened", handle.id());

        let stream = async_stream::stream! {
            while let Some(e) = rx.recv().await {
                yield e;
            }
        };

        (context::Ws::new(handle, owner), Box::pin(stream))
    }

    pub async fn handle_command(&self, ctx: &context::Ws, command: Command) -> super::Result<()> {
        match command {
            Command::Identify { user_id } => {
                if user_id.ne(ctx.owner()) {
                    return Err(super::Error::Impersonation {
                        claimed: user_id,
                        identified: ctx.owner().clone(),
                    });
                }
                if !ctx.identify(user_id.clone()).await {
                    debug!("connection {} already identified", ctx.handle().id());
                    return Ok(());
                }

                self.presence
                    .register(user_id.clone(), ctx.handle().clone())
                    .await;
                debug!("{user_id} is online via {}", ctx.handle().id());

                self.broadcast_active_users().await;
            }
            Command::JoinRoom { room_id } => {
                let sub = ctx.sub().await.ok_or(super::Error::NotIdentified)?;
                if !self.room_service.find_by_id(&room_id).await?.is_member(&sub) {
                    return Err(super::Error::NotMember(room_id));
                }

                self.channels
                    .write()
                    .await
                    .entry(room_id)
                    .or_default()
                    .insert(ctx.handle().id());
                ctx.join().await;
                debug!("{sub} joined room {room_id}");
            }
            Command::LeaveRoom { room_id } => {
                let sub = ctx.sub().await.ok_or(super::Error::NotIdentified)?;

                let mut channels = self.channels.write().await;
                if let Some(subscribers) = channels.get_mut(&room_id) {
                    subscribers.remove(&ctx.handle().id());
                    if subscribers.is_empty() {
                        channels.remove(&room_id);
                    }
                }
                debug!("{sub} left room {room_id}");
            }
            Command::SendMessage {
                sender_id,
                receiver_id,
                room_id,
                text,
            } => {
                let identified = ctx.sub().await.ok_or(super::Error::NotIdentified)?;
                if sender_id.ne(&identified) {
                    return Err(super::Error::Impersonation {
                        claimed: sender_id,
                        identified,
                    });
                }
                if text.trim().is_empty() {
                    return Err(super::Error::EmptyText);
                }
                if room_id.is_none() && receiver_id.is_none() {
                    return Err(super::Error::MissingTarget);
                }

                let delivered = self
                    .deliver(
                        room_id.as_ref(),
                        receiver_id.as_ref(),
                        Event::MessageReceived {
                            sender_id,
                            text,
                            room_id,
                        },
                    )
                    .await;
                trace!("message from {identified} delivered to {delivered} connection(s)");
            }
        }

        Ok(())
    }

    pub async fn disconnect(&self, ctx: &context::Ws) {
        let id = ctx.handle().id();
        let sub = ctx.disconnect().await;

        self.connections.write().await.remove(&id);
        self.channels.write().await.retain(|_, subscribers| {
            subscribers.remove(&id);
            !subscribers.is_empty()
        });

        if self.presence.unregister(ctx.handle()).await.is_none() {
            debug!("connection {id} no longer owned a presence entry");
        }

        if let Some(sub) = sub {
            debug!("{sub} disconnected from {id}");
            self.broadcast_active_users().await;
        }
    }

    pub async fn broadcast_active_users(&self) {
        let users = self.presence.list_active().await;
        let event = Event::ActiveUsers { users };

        for h in self.connections.read().await.values() {
            h.send(event.clone());
        }
    }

    pub async fn broadcast_to_room(&self, room_id: &room::Id, event: Event) -> usize {
        self.deliver(Some(room_id), None, event).await
    }

    /// Room subscribers plus the receiver's live connection, each at most once.
    async fn deliver(
        &self,
        room_id: Option<&room::Id>,
        receiver: Option<&user::Sub>,
        event: Event,
    ) -> usize {
        let mut targets: HashMap<ConnectionId, Handle> = HashMap::new();

        if let Some(room_id) = room_id {
            let channels = self.channels.read().await;
            let connections = self.connections.read().await;
            for id in channels.get(room_id).into_iter().flatten() {
                if let Some(h) = connections.get(id) {
                    targets.insert(*id, h.clone());
                }
            }
        }

        if let Some(receiver) = receiver {
            if let Some(h) = self.presence.lookup(receiver).await {
                targets.insert(h.id(), h);
            }
        }

        targets
            .values()
            .filter(|h| h.send(event.clone()))
            .count()
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeSet;

    use futures::{FutureExt, StreamExt};

    use crate::event;
    use crate::room::repository::InMemoryRoomRepository;
    use crate::room::service::RoomServiceImpl;

    use super::*;

    fn sub(s: &str) -> user::Sub {
        user::Sub::from(s)
    }

    fn service() -> (EventService, room::Service) {
        let rooms: room::Service = Arc::new(RoomServiceImpl::new(Arc::new(
            InMemoryRoomRepository::new(),
        )));
        (
            EventService::new(presence::Registry::new(), rooms.clone()),
            rooms,
        )
    }

    async fn group(rooms: &room::Service, members: &[&str]) -> room::Id {
        let (creator, rest) = members.split_first().unwrap();
        let rest = rest.iter().map(|m| sub(m)).collect::<Vec<_>>();
        *rooms
            .create_group(&sub(creator), "Team", &rest)
            .await
            .unwrap()
            .id()
    }

    fn drain(events: &mut EventStream) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Some(Some(e)) = events.next().now_or_never() {
            drained.push(e);
        }
        drained
    }

    async fn identified(s: &EventService, name: &str) -> (context::Ws, EventStream) {
        let (ctx, mut events) = s.connect(sub(name)).await;
        s.handle_command(&ctx, Command::Identify { user_id: sub(name) })
            .await
            .unwrap();
        drain(&mut events);
        (ctx, events)
    }

    fn send(sender: &str, receiver: Option<&str>, room_id: Option<room::Id>) -> Command {
        Command::SendMessage {
            sender_id: sub(sender),
            receiver_id: receiver.map(sub),
            room_id,
            text: "hi".to_owned(),
        }
    }

    #[tokio::test]
    async fn should_broadcast_active_users_on_identify() {
        let (s, _) = service();
        let (_jora, mut jora_events) = identified(&s, "jora").await;
        let (_anon, mut anon_events) = s.connect(sub("igor")).await;

        let (_valera, _) = identified(&s, "valera").await;

        let expected = Event::ActiveUsers {
            users: BTreeSet::from([sub("jora"), sub("valera")]),
        };
        assert_eq!(drain(&mut jora_events), vec![expected.clone()]);
        assert_eq!(drain(&mut anon_events), vec![expected]);
    }

    #[tokio::test]
    async fn should_drop_user_from_active_list_on_disconnect() {
        let (s, _) = service();
        let (_jora, mut jora_events) = identified(&s, "jora").await;
        let (valera, _) = identified(&s, "valera").await;
        drain(&mut jora_events);

        s.disconnect(&valera).await;

        assert_eq!(
            drain(&mut jora_events),
            vec![Event::ActiveUsers {
                users: BTreeSet::from([sub("jora")])
            }]
        );
    }

    #[tokio::test]
    async fn should_keep_fresh_connection_after_stale_disconnect() {
        let registry = presence::Registry::new();
        let rooms: room::Service = Arc::new(RoomServiceImpl::new(Arc::new(
            InMemoryRoomRepository::new(),
        )));
        let s = EventService::new(registry.clone(), rooms);
        let (old, _) = identified(&s, "jora").await;
        let (fresh, _) = identified(&s, "jora").await;

        s.disconnect(&old).await;

        assert_eq!(registry.lookup(&sub("jora")).await, Some(fresh.handle().clone()));
    }

    #[tokio::test]
    async fn should_require_identify_before_join() {
        let (s, rooms) = service();
        let room_id = group(&rooms, &["jora", "valera"]).await;
        let (ctx, _) = s.connect(sub("jora")).await;

        let res = s.handle_command(&ctx, Command::JoinRoom { room_id }).await;
        assert!(matches!(res, Err(event::Error::NotIdentified)));
    }

    #[tokio::test]
    async fn should_reject_identify_as_someone_else() {
        let (s, _) = service();
        let registry = s.presence.clone();
        let (ctx, mut events) = s.connect(sub("igor")).await;

        let res = s
            .handle_command(&ctx, Command::Identify { user_id: sub("valera") })
            .await;
        assert!(matches!(res, Err(event::Error::Impersonation { .. })));
        assert_eq!(ctx.state().await, context::State::Connecting);
        assert_eq!(registry.lookup(&sub("valera")).await, None);
        assert!(drain(&mut events).is_empty());
    }

    #[tokio::test]
    async fn should_keep_non_member_out_of_room_channel() {
        let (s, rooms) = service();
        let room_id = group(&rooms, &["jora", "valera"]).await;
        let (jora, _) = identified(&s, "jora").await;
        let (igor, mut igor_events) = identified(&s, "igor").await;

        let res = s.handle_command(&igor, Command::JoinRoom { room_id }).await;
        assert!(matches!(res, Err(event::Error::NotMember(_))));

        let res = s
            .handle_command(&igor, Command::JoinRoom { room_id: room::Id::random() })
            .await;
        assert!(matches!(
            res,
            Err(event::Error::_Room(room::Error::NotFound(_)))
        ));

        s.handle_command(&jora, send("jora", None, Some(room_id)))
            .await
            .unwrap();
        assert!(drain(&mut igor_events).is_empty());
    }

    #[tokio::test]
    async fn should_deliver_once_to_subscriber_who_is_also_receiver() {
        let (s, rooms) = service();
        let room_id = group(&rooms, &["jora", "valera"]).await;
        let (jora, mut jora_events) = identified(&s, "jora").await;
        let (valera, mut valera_events) = identified(&s, "valera").await;
        drain(&mut jora_events);

        s.handle_command(&valera, Command::JoinRoom { room_id })
            .await
            .unwrap();

        s.handle_command(&jora, send("jora", Some("valera"), Some(room_id)))
            .await
            .unwrap();

        assert_eq!(
            drain(&mut valera_events),
            vec![Event::MessageReceived {
                sender_id: sub("jora"),
                text: "hi".to_owned(),
                room_id: Some(room_id),
            }]
        );
        assert!(drain(&mut jora_events).is_empty());
    }

    #[tokio::test]
    async fn should_stop_delivering_after_leave_room() {
        let (s, rooms) = service();
        let room_id = group(&rooms, &["jora", "valera"]).await;
        let (jora, _) = identified(&s, "jora").await;
        let (valera, mut valera_events) = identified(&s, "valera").await;

        s.handle_command(&valera, Command::JoinRoom { room_id })
            .await
            .unwrap();
        s.handle_command(&valera, Command::LeaveRoom { room_id })
            .await
            .unwrap();

        s.handle_command(&jora, send("jora", None, Some(room_id)))
            .await
            .unwrap();
        assert!(drain(&mut valera_events).is_empty());
    }

    #[tokio::test]
    async fn should_reject_invalid_send() {
        let (s, _) = service();
        let (jora, _) = identified(&s, "jora").await;

        let res = s.handle_command(&jora, send("valera", Some("igor"), None)).await;
        assert!(matches!(res, Err(event::Error::Impersonation { .. })));

        let res = s.handle_command(&jora, send("jora", None, None)).await;
        assert!(matches!(res, Err(event::Error::MissingTarget)));

        let res = s
            .handle_command(
                &jora,
                Command::SendMessage {
                    sender_id: sub("jora"),
                    receiver_id: Some(sub("valera")),
                    room_id: None,
                    text: "  ".to_owned(),
                },
            )
            .await;
        assert!(matches!(res, Err(event::Error::EmptyText)));
    }

    #[tokio::test]
    async fn should_silently_skip_offline_receiver() {
        let (s, _) = service();
        let (jora, mut jora_events) = identified(&s, "jora").await;

        s.handle_command(&jora, send("jora", Some("valera"), None))
            .await
            .unwrap();
        assert!(drain(&mut jora_events).is_empty());
    }

    #[tokio::test]
    async fn should_broadcast_room_read_to_subscribers() {
        let (s, rooms) = service();
        let room_id = group(&rooms, &["jora", "valera"]).await;
        let (valera, mut valera_events) = identified(&s, "valera").await;
        s.handle_command(&valera, Command::JoinRoom { room_id })
            .await
            .unwrap();

        let event = Event::RoomRead {
            room_id,
            reader: sub("jora"),
        };
        assert_eq!(s.broadcast_to_room(&room_id, event.clone()).await, 1);
        assert_eq!(drain(&mut valera_events), vec![event]);
    }
}
