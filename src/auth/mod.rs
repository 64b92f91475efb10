use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::user;

mod handler;
pub mod middleware;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Service = Arc<dyn service::AuthService + Send + Sync>;

#[derive(Deserialize, Serialize, Clone)]
struct TokenClaims {
    sub: user::Sub,
    exp: u64,
    /// Space separated, only present on service tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

impl TokenClaims {
    fn has_scope(&self, scope: &str) -> bool {
        self.scope
            .as_deref()
            .is_some_and(|granted| granted.split_whitespace().any(|s| s == scope))
    }
}

/// The caller behind a validated bearer token.
#[derive(Clone, Debug)]
pub struct User {
    sub: user::Sub,
}

impl User {
    pub fn new(sub: user::Sub) -> Self {
        Self { sub }
    }

    pub const fn sub(&self) -> &user::Sub {
        &self.sub
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unauthorized to access the resource")]
    Unauthorized,
    #[error("token is malformed")]
    TokenMalformed,
    #[error("token is invalid or expired")]
    InvalidToken,
    #[error("token lacks the '{0}' scope")]
    MissingScope(&'static str),

    #[error(transparent)]
    _JsonWebtoken(#[from] jsonwebtoken::errors::Error),
}
