use std::fmt::Display;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{room, state::AppState};

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn repository::MessageRepository + Send + Sync>;
pub type Service = Arc<dyn service::MessageService + Send + Sync>;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route(
            "/rooms/{id}/messages",
            get(handler::api::find_all).post(handler::api::send),
        )
        .route("/rooms/{id}/read", put(handler::api::mark_read))
        .with_state(s)
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn get(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("message text is empty")]
    EmptyText,
    #[error("user is not a member of room {0:?}")]
    NotMember(room::Id),

    #[error(transparent)]
    _Room(#[from] room::Error),
    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}
