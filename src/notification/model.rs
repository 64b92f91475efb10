use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user;

use super::{Id, Kind};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    id: Id,
    recipient: user::Sub,
    title: String,
    message: String,
    kind: Kind,
    #[serde(skip_serializing_if = "Option::is_none")]
    link: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: user::Sub,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: Kind,
        link: Option<String>,
    ) -> Self {
        Self {
            id: Id::random(),
            recipient,
            title: title.into(),
            message: message.into(),
            kind,
            link,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn restore(
        id: Id,
        recipient: user::Sub,
        title: String,
        message: String,
        kind: Kind,
        link: Option<String>,
        is_read: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            recipient,
            title,
            message,
            kind,
            link,
            is_read,
            created_at,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn recipient(&self) -> &user::Sub {
        &self.recipient
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub const fn is_read(&self) -> bool {
        self.is_read
    }

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub(super) fn mark_read(&mut self) {
        self.is_read = true;
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: usize,
}
