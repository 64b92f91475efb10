use axum::http::StatusCode;
use log::error;

impl From<super::Error> for StatusCode {
    fn from(e: super::Error) -> Self {
        match e {
            super::Error::NotFound(_) => Self::NOT_FOUND,
            super::Error::Forbidden(_) => Self::FORBIDDEN,
            super::Error::UnsupportedKind(kind) => {
                error!("stored notification has unsupported kind: {kind}");
                Self::INTERNAL_SERVER_ERROR
            }
            super::Error::_R2d2(e) => {
                error!("notification storage unavailable: {e:?}");
                Self::INTERNAL_SERVER_ERROR
            }
            super::Error::_Diesel(e) => {
                error!("notification query failed: {e:?}");
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

    use crate::{
        auth,
        notification::{
            self,
            model::{Notification, UnreadCount},
        },
    };

    pub async fn find_all(
        auth_user: Extension<auth::User>,
        notification_service: State<notification::Service>,
    ) -> crate::Result<Json<Vec<Notification>>> {
        let notifications = notification_service.list_for_user(auth_user.sub()).await?;
        Ok(Json(notifications))
    }

    pub async fn count_unread(
        auth_user: Extension<auth::User>,
        notification_service: State<notification::Service>,
    ) -> crate::Result<Json<UnreadCount>> {
        let count = notification_service.count_unread(auth_user.sub()).await?;
        Ok(Json(UnreadCount { count }))
    }

    pub async fn mark_read(
        auth_user: Extension<auth::User>,
        notification_service: State<notification::Service>,
        Path(id): Path<notification::Id>,
    ) -> crate::Result<StatusCode> {
        notification_service.mark_read(&id, auth_user.sub()).await?;
        Ok(StatusCode::NO_CONTENT)
    }

    pub async fn mark_all_read(
        auth_user: Extension<auth::User>,
        notification_service: State<notification::Service>,
    ) -> crate::Result<StatusCode> {
        notification_service.mark_all_read(auth_user.sub()).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
