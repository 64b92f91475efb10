use axum::http::StatusCode;
use log::error;

impl From<super::Error> for StatusCode {
    fn from(e: super::Error) -> Self {
        match e {
            super::Error::EmptyText => Self::BAD_REQUEST,
            super::Error::NotMember(_) => Self::FORBIDDEN,
            super::Error::_Room(e) => e.into(),
            super::Error::_R2d2(e) => {
                error!("message storage unavailable: {e:?}");
                Self::INTERNAL_SERVER_ERROR
            }
            super::Error::_Diesel(e) => {
                error!("message query failed: {e:?}");
                Self::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub(super) mod api {
    use axum::{
        Extension, Json,
        extract::{Path, State},
        http::StatusCode,
    };
    use serde::Deserialize;

    use crate::{
        auth,
        message::{self, model::Message},
        room,
    };

    pub async fn find_all(
        auth_user: Extension<auth::User>,
        message_service: State<message::Service>,
        Path(id): Path<room::Id>,
    ) -> crate::Result<Json<Vec<Message>>> {
        let messages = message_service.list(&id, auth_user.sub()).await?;
        Ok(Json(messages))
    }

    #[derive(Deserialize)]
    pub struct SendParams {
        text: String,
    }

    pub async fn send(
        auth_user: Extension<auth::User>,
        message_service: State<message::Service>,
        Path(id): Path<room::Id>,
        Json(params): Json<SendParams>,
    ) -> crate::Result<(StatusCode, Json<Message>)> {
        let msg = message_service
            .send(&id, auth_user.sub(), &params.text)
            .await?;
        Ok((StatusCode::CREATED, Json(msg)))
    }

    pub async fn mark_read(
        auth_user: Extension<auth::User>,
        message_service: State<message::Service>,
        Path(id): Path<room::Id>,
    ) -> crate::Result<StatusCode> {
        message_service.mark_room_read(&id, auth_user.sub()).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
