pub(super) mod api {
    use axum::{
        Json,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Response},
    };

    use crate::{fanout::Coordinator, order};

    pub async fn intake(
        fanout: State<Coordinator>,
        Json(event): Json<order::Event>,
    ) -> crate::Result<Response> {
        let res = match fanout.order_transitioned(&event).await? {
            Some(n) => (StatusCode::CREATED, Json(n)).into_response(),
            None => StatusCode::NO_CONTENT.into_response(),
        };
        Ok(res)
    }
}
