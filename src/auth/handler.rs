use axum::http::StatusCode;
use log::error;

impl From<super::Error> for StatusCode {
    fn from(e: super::Error) -> Self {
        match e {
            super::Error::Unauthorized
            | super::Error::TokenMalformed
            | super::Error::InvalidToken => Self::UNAUTHORIZED,
            super::Error::MissingScope(_) => Self::FORBIDDEN,
            super::Error::_JsonWebtoken(e) => {
                error!("failed to sign token: {e:?}");
                Self::INTERNAL_SERVER_ERROR
            }
        }
    }
}
