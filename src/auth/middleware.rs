use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use log::debug;

use crate::{auth, order};

fn bearer(req: &Request) -> super::Result<Authorization<Bearer>> {
    req.headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| {
            debug!("No bearer token on {}", req.uri().path());
            super::Error::Unauthorized
        })
}

pub async fn authorize(
    auth_service: State<auth::Service>,
    mut req: Request,
    next: Next,
) -> crate::Result<Response> {
    let bearer = bearer(&req)?;

    let sub = auth_service.validate(bearer.token()).await?;
    req.extensions_mut().insert(auth::User::new(sub));

    Ok(next.run(req).await)
}

/// Lets through backend callers allowed to report order transitions.
pub async fn authorize_order_events(
    auth_service: State<auth::Service>,
    req: Request,
    next: Next,
) -> crate::Result<Response> {
    let bearer = bearer(&req)?;

    let caller = auth_service
        .validate_scope(bearer.token(), order::EVENTS_SCOPE)
        .await?;
    debug!("order event submitted by {caller}");

    Ok(next.run(req).await)
}
