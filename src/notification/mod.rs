use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

mod handler;
pub mod model;
pub mod repository;
pub mod service;

pub type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn repository::NotificationRepository + Send + Sync>;
pub type Service = Arc<dyn service::NotificationService + Send + Sync>;

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/notifications", get(handler::api::find_all))
        .route("/notifications/unread", get(handler::api::count_unread))
        .route("/notifications/read-all", put(handler::api::mark_all_read))
        .route("/notifications/{id}/read", put(handler::api::mark_read))
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

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Kind {
    #[serde(rename = "new_message")]
    NewMessage,
    #[serde(rename = "order_new")]
    OrderNew,
    #[serde(rename = "order_paid")]
    OrderPaid,
    #[serde(rename = "order_delivered")]
    OrderDelivered,
}

impl Kind {
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NewMessage => "new_message",
            Self::OrderNew => "order_new",
            Self::OrderPaid => "order_paid",
            Self::OrderDelivered => "order_delivered",
        }
    }
}

impl FromStr for Kind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new_message" => Ok(Self::NewMessage),
            "order_new" => Ok(Self::OrderNew),
            "order_paid" => Ok(Self::OrderPaid),
            "order_delivered" => Ok(Self::OrderDelivered),
            other => Err(Error::UnsupportedKind(other.to_owned())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("notification not found: {0:?}")]
    NotFound(Id),
    #[error("notification {0:?} belongs to another user")]
    Forbidden(Id),
    #[error("unsupported notification kind: {0}")]
    UnsupportedKind(String),

    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_use_wire_names() {
        for kind in [
            Kind::NewMessage,
            Kind::OrderNew,
            Kind::OrderPaid,
            Kind::OrderDelivered,
        ] {
            let json = serde_json::to_value(&kind).unwrap();
            assert_eq!(json, kind.as_str());
            assert_eq!(Kind::from_str(kind.as_str()).unwrap(), kind);
        }

        assert!(matches!(
            Kind::from_str("order_lost"),
            Err(Error::UnsupportedKind(_))
        ));
    }
}
