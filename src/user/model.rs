use diesel::prelude::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use super::Sub;

/// Projection of a user row owned by the identity subsystem. This crate only reads it.
#[derive(Queryable, Selectable, Insertable, Clone)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    sub: String,
    name: String,
    email: String,
}

impl User {
    pub fn new(sub: &Sub, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            sub: sub.as_str().to_owned(),
            name: name.into(),
            email: email.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    sub: Sub,
    name: String,
    email: String,
}

impl UserInfo {
    pub const fn sub(&self) -> &Sub {
        &self.sub
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<User> for UserInfo {
    fn from(u: User) -> Self {
        Self {
            sub: Sub::from(u.sub),
            name: u.name,
            email: u.email,
        }
    }
}
