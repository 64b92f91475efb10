use axum::routing::get;
use axum::{Router, middleware};

pub mod auth;
pub mod error;
pub mod event;
pub mod fanout;
pub mod integration;
pub mod message;
pub mod notification;
pub mod order;
pub mod presence;
pub mod room;
mod schema;
pub mod state;
pub mod user;

pub use error::{Error, Result};

use state::AppState;

/// HTTP and websocket surface of the service.
pub fn router(s: AppState) -> Router {
    let protected = Router::new()
        .merge(room::api(s.clone()))
        .merge(message::api(s.clone()))
        .merge(notification::api(s.clone()))
        .route_layer(middleware::from_fn_with_state(
            s.clone(),
            auth::middleware::authorize,
        ));

    let order_intake = order::api(s.clone()).route_layer(middleware::from_fn_with_state(
        s.clone(),
        auth::middleware::authorize_order_events,
    ));

    let realtime = event::api(s.clone()).route_layer(middleware::from_fn_with_state(
        s,
        auth::middleware::authorize,
    ));

    Router::new()
        .nest("/api", protected.merge(order_intake))
        .merge(realtime)
        .route("/health", get(|| async { "OK" }))
}
