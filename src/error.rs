use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::debug;
use serde::Serialize;

use crate::{auth, event, integration, message, notification, room, user};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    _Auth(#[from] auth::Error),
    #[error(transparent)]
    _Event(#[from] event::Error),
    #[error(transparent)]
    _Integration(#[from] integration::Error),
    #[error(transparent)]
    _Message(#[from] message::Error),
    #[error(transparent)]
    _Notification(#[from] notification::Error),
    #[error(transparent)]
    _Room(#[from] room::Error),
    #[error(transparent)]
    _User(#[from] user::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        debug!("request failed: {self}");

        let message = self.to_string();
        let status = match self {
            Self::_Auth(e) => StatusCode::from(e),
            Self::_Message(e) => StatusCode::from(e),
            Self::_Notification(e) => StatusCode::from(e),
            Self::_Room(e) => StatusCode::from(e),
            Self::_User(user::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::_User(_) | Self::_Event(_) | Self::_Integration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status.is_server_error() {
            "Something went wrong".to_owned()
        } else {
            message
        };

        (status, Json(ErrorResponse { message })).into_response()
    }
}
