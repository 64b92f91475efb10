use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::service::JwtAuthService;
use crate::event::service::EventService;
use crate::fanout::Coordinator;
use crate::integration::{self, Storage};
use crate::message::repository::{InMemoryMessageRepository, PgMessageRepository};
use crate::message::service::MessageServiceImpl;
use crate::notification::repository::{InMemoryNotificationRepository, PgNotificationRepository};
use crate::notification::service::NotificationServiceImpl;
use crate::room::repository::{InMemoryRoomRepository, PgRoomRepository};
use crate::room::service::RoomServiceImpl;
use crate::user::repository::{InMemoryUserRepository, PgUserRepository};
use crate::user::service::UserServiceImpl;
use crate::{auth, message, notification, presence, room, user};

#[derive(Clone)]
pub struct Repositories {
    pub user: user::Repository,
    pub room: room::Repository,
    pub message: message::Repository,
    pub notification: notification::Repository,
}

impl Repositories {
    pub fn postgres(pool: integration::db::Pool) -> Self {
        Self {
            user: Arc::new(PgUserRepository::new(pool.clone())),
            room: Arc::new(PgRoomRepository::new(pool.clone())),
            message: Arc::new(PgMessageRepository::new(pool.clone())),
            notification: Arc::new(PgNotificationRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            user: Arc::new(InMemoryUserRepository::new()),
            room: Arc::new(InMemoryRoomRepository::new()),
            message: Arc::new(InMemoryMessageRepository::new()),
            notification: Arc::new(InMemoryNotificationRepository::new()),
        }
    }
}

#[derive(Clone, FromRef)]
pub struct AppState {
    pub auth_service: auth::Service,
    pub user_service: user::Service,
    pub room_service: room::Service,
    pub message_service: message::Service,
    pub notification_service: notification::Service,
    pub event_service: EventService,
    pub fanout: Coordinator,
}

impl AppState {
    pub fn init(cfg: &integration::Config) -> integration::Result<Self> {
        let repos = match &cfg.storage {
            Storage::Postgres(db) => Repositories::postgres(db.try_connect()?),
            Storage::Memory => Repositories::in_memory(),
        };

        let auth_service = Arc::new(JwtAuthService::new(&cfg.jwt_secret));
        Ok(Self::with_repositories(repos, auth_service))
    }

    pub fn with_repositories(repos: Repositories, auth_service: auth::Service) -> Self {
        let presence = presence::Registry::new();

        let user_service: user::Service = Arc::new(UserServiceImpl::new(repos.user));
        let room_service: room::Service = Arc::new(RoomServiceImpl::new(repos.room));
        let notification_service: notification::Service =
            Arc::new(NotificationServiceImpl::new(repos.notification));

        let event_service = EventService::new(presence.clone(), room_service.clone());
        let fanout = Coordinator::new(presence, notification_service.clone(), user_service.clone());

        let message_service: message::Service = Arc::new(MessageServiceImpl::new(
            repos.message,
            room_service.clone(),
            event_service.clone(),
            fanout.clone(),
        ));

        Self {
            auth_service,
            user_service,
            room_service,
            message_service,
            notification_service,
            event_service,
            fanout,
        }
    }
}
