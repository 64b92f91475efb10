//! Realtime gateway: one websocket per client, room channels and presence broadcasts.

use axum::Router;
use axum::routing::get;

use crate::state::AppState;
use crate::{room, user};

pub mod context;
mod handler;
pub mod model;
pub mod service;

pub use model::{Command, Event};

type Result<T> = std::result::Result<T, Error>;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/ws", get(handler::ws))
        .with_state(s)
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("connection has not identified yet")]
    NotIdentified,
    #[error("{identified} cannot act as {claimed}")]
    Impersonation {
        claimed: user::Sub,
        identified: user::Sub,
    },
    #[error("message text is empty")]
    EmptyText,
    #[error("message has neither a room nor a receiver")]
    MissingTarget,
    #[error("not a member of room {0}")]
    NotMember(room::Id),

    #[error(transparent)]
    _Room(#[from] room::Error),
    #[error(transparent)]
    _ParseJson(#[from] serde_json::Error),
    #[error(transparent)]
    _Axum(#[from] axum::Error),
}
