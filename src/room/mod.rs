use std::fmt::Display;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

mod handler;
pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn repository::RoomRepository + Send + Sync>;
pub type Service = Arc<dyn service::RoomService + Send + Sync>;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/rooms", get(handler::api::find_all))
        .route("/rooms", post(handler::api::create_direct))
        .route("/rooms/group", post(handler::api::create_group))
        .route("/rooms/between/{sub}", get(handler::api::find_between))
        .route("/rooms/{id}/leave", put(handler::api::leave))
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
    #[error("room not found: {0:?}")]
    NotFound(Id),
    #[error("room is not a group: {0:?}")]
    NotGroup(Id),
    #[error("missing group name")]
    MissingName,
    #[error("not enough members: {0}")]
    NotEnoughMembers(usize),
    #[error("cannot open a chat with yourself")]
    SelfChat,

    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}
