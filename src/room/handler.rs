use axum::http::StatusCode;
use log::error;

impl From<super::Error> for StatusCode {
    fn from(e: super::Error) -> Self {
        match e {
            // only groups can be left, a direct room is not found among them
            super::Error::NotFound(_) | super::Error::NotGroup(_) => Self::NOT_FOUND,
            super::Error::MissingName
            | super::Error::NotEnoughMembers(_)
            | super::Error::SelfChat => Self::BAD_REQUEST,
            super::Error::_R2d2(e) => {
                error!("room storage unavailable: {e:?}");
                Self::INTERNAL_SERVER_ERROR
            }
            super::Error::_Diesel(e) => {
                error!("room query failed: {e:?}");
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
        room::{
            self,
            model::{Departure, Room, RoomDto},
        },
        user::Sub,
    };

    /// Most recent activity first.
    fn to_dtos(mut rooms: Vec<Room>) -> Vec<RoomDto> {
        rooms.sort_by(|a, b| b.activity().cmp(a.activity()));
        rooms.into_iter().map(RoomDto::from).collect()
    }

    pub async fn find_all(
        auth_user: Extension<auth::User>,
        room_service: State<room::Service>,
    ) -> crate::Result<Json<Vec<RoomDto>>> {
        let rooms = room_service.list_for_user(auth_user.sub()).await?;
        Ok(Json(to_dtos(rooms)))
    }

    pub async fn find_between(
        auth_user: Extension<auth::User>,
        room_service: State<room::Service>,
        Path(sub): Path<Sub>,
    ) -> crate::Result<Json<Vec<RoomDto>>> {
        let rooms = room_service.find_between(auth_user.sub(), &sub).await?;
        Ok(Json(to_dtos(rooms)))
    }

    #[derive(Deserialize)]
    pub struct CreateDirectParams {
        receiver_id: Sub,
    }

    pub async fn create_direct(
        auth_user: Extension<auth::User>,
        room_service: State<room::Service>,
        Json(params): Json<CreateDirectParams>,
    ) -> crate::Result<(StatusCode, Json<RoomDto>)> {
        let room = room_service
            .create_direct(auth_user.sub(), &params.receiver_id)
            .await?;
        Ok((StatusCode::CREATED, Json(room.into())))
    }

    #[derive(Deserialize)]
    pub struct CreateGroupParams {
        name: String,
        #[serde(default)]
        member_ids: Vec<Sub>,
    }

    pub async fn create_group(
        auth_user: Extension<auth::User>,
        room_service: State<room::Service>,
        Json(params): Json<CreateGroupParams>,
    ) -> crate::Result<(StatusCode, Json<RoomDto>)> {
        let room = room_service
            .create_group(auth_user.sub(), &params.name, &params.member_ids)
            .await?;
        Ok((StatusCode::CREATED, Json(room.into())))
    }

    pub async fn leave(
        auth_user: Extension<auth::User>,
        room_service: State<room::Service>,
        Path(id): Path<room::Id>,
    ) -> crate::Result<Json<Departure>> {
        let departure = room_service.leave_group(&id, auth_user.sub()).await?;
        Ok(Json(departure))
    }
}
