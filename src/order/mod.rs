//! Lifecycle events emitted by the order subsystem.

use axum::{Router, routing::post};
use serde::{Deserialize, Serialize};

use crate::notification;
use crate::state::AppState;
use crate::user;

mod handler;
pub mod listener;

/// Scope a service token needs to submit order events over HTTP.
pub const EVENTS_SCOPE: &str = "orders:events";

pub fn api<S>(s: AppState) -> Router<S> {
    Router::new()
        .route("/orders/events", post(handler::api::intake))
        .with_state(s)
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Created,
    Paid,
    Delivered,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Event {
    order_id: String,
    recipient: user::Sub,
    #[serde(default)]
    actor: Option<user::Sub>,
    kind: Kind,
    #[serde(default)]
    link: Option<String>,
}

impl Event {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub const fn recipient(&self) -> &user::Sub {
        &self.recipient
    }

    pub const fn kind(&self) -> Kind {
        self.kind
    }

    /// The buyer paying or the seller delivering is not told about it.
    pub fn is_self_inflicted(&self) -> bool {
        self.actor.as_ref() == Some(&self.recipient)
    }

    /// Only same-site paths are kept, anything else points at the order page.
    pub fn link(&self) -> String {
        match &self.link {
            Some(link) if is_local_path(link) => link.clone(),
            _ => format!("/order/{}", self.order_id),
        }
    }

    pub fn describe(&self) -> (notification::Kind, &'static str, String) {
        let id = &self.order_id;
        match self.kind {
            Kind::Created => (
                notification::Kind::OrderNew,
                "New order",
                format!("You have a new order #{id}"),
            ),
            Kind::Paid => (
                notification::Kind::OrderPaid,
                "Order paid",
                format!("Order #{id} has been paid"),
            ),
            Kind::Delivered => (
                notification::Kind::OrderDelivered,
                "Order delivered",
                format!("Order #{id} has been delivered"),
            ),
        }
    }
}

fn is_local_path(link: &str) -> bool {
    link.starts_with('/') && !link.starts_with("//") && !link.starts_with("/\\")
}
