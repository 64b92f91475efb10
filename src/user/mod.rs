use std::fmt::Display;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod model;
pub mod repository;
pub mod service;

type Result<T> = std::result::Result<T, Error>;
pub type Repository = Arc<dyn repository::UserRepository + Send + Sync>;
pub type Service = Arc<dyn service::UserService + Send + Sync>;

/// Stable user identifier issued by the identity provider.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sub(String);

impl Sub {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Sub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Sub {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Sub {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("user not found: {0:?}")]
    NotFound(Sub),

    #[error(transparent)]
    _R2d2(#[from] r2d2::Error),
    #[error(transparent)]
    _Diesel(#[from] diesel::result::Error),
}
