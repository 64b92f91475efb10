use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user;

use super::Id;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Direct,
    Group { name: String },
}

/// Denormalized copy of the newest message, kept on the room for list views.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LastMessage {
    sender: user::Sub,
    text: String,
    is_read: bool,
    timestamp: DateTime<Utc>,
}

impl LastMessage {
    pub fn new(sender: user::Sub, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sender,
            text: text.into(),
            is_read: false,
            timestamp,
        }
    }

    pub(super) fn restore(
        sender: user::Sub,
        text: String,
        is_read: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            sender,
            text,
            is_read,
            timestamp,
        }
    }

    pub const fn sender(&self) -> &user::Sub {
        &self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub const fn is_read(&self) -> bool {
        self.is_read
    }

    pub const fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    /// The sender's own message never counts as unread for them.
    pub(super) fn mark_read_by(&mut self, viewer: &user::Sub) -> bool {
        if self.sender.eq(viewer) || self.is_read {
            return false;
        }
        self.is_read = true;
        true
    }
}

#[derive(Clone, Debug)]
pub struct Room {
    id: Id,
    kind: Kind,
    members: BTreeSet<user::Sub>,
    last_message: Option<LastMessage>,
    created_at: DateTime<Utc>,
}

impl Room {
    pub fn direct(a: user::Sub, b: user::Sub) -> Self {
        Self {
            id: Id::random(),
            kind: Kind::Direct,
            members: BTreeSet::from([a, b]),
            last_message: None,
            created_at: Utc::now(),
        }
    }

    pub fn group(name: impl Into<String>, members: BTreeSet<user::Sub>) -> Self {
        Self {
            id: Id::random(),
            kind: Kind::Group { name: name.into() },
            members,
            last_message: None,
            created_at: Utc::now(),
        }
    }

    pub(super) fn restore(
        id: Id,
        kind: Kind,
        members: BTreeSet<user::Sub>,
        last_message: Option<LastMessage>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            members,
            last_message,
            created_at,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn kind(&self) -> &Kind {
        &self.kind
    }

    pub const fn is_group(&self) -> bool {
        matches!(self.kind, Kind::Group { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            Kind::Direct => None,
            Kind::Group { name } => Some(name),
        }
    }

    pub const fn members(&self) -> &BTreeSet<user::Sub> {
        &self.members
    }

    pub fn is_member(&self, sub: &user::Sub) -> bool {
        self.members.contains(sub)
    }

    pub const fn last_message(&self) -> Option<&LastMessage> {
        self.last_message.as_ref()
    }

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub(super) fn set_last_message(&mut self, msg: LastMessage) {
        self.last_message = Some(msg);
    }

    pub(super) fn last_message_mut(&mut self) -> Option<&mut LastMessage> {
        self.last_message.as_mut()
    }

    pub(super) fn remove_member(&mut self, sub: &user::Sub) -> bool {
        self.members.remove(sub)
    }

    /// Newest activity first; rooms without messages fall back to creation time.
    pub fn activity(&self) -> &DateTime<Utc> {
        self.last_message
            .as_ref()
            .map(LastMessage::timestamp)
            .unwrap_or(&self.created_at)
    }
}

/// Outcome of leaving a group.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct Departure {
    pub left: bool,
    pub deleted: bool,
}

impl Departure {
    pub const UNCHANGED: Self = Self {
        left: false,
        deleted: false,
    };
    pub const LEFT: Self = Self {
        left: true,
        deleted: false,
    };
    pub const DELETED: Self = Self {
        left: true,
        deleted: true,
    };
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomDto {
    id: Id,
    is_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    members: Vec<user::Sub>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_message: Option<LastMessage>,
    created_at: DateTime<Utc>,
}

impl RoomDto {
    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn is_group(&self) -> bool {
        self.is_group
    }

    pub fn members(&self) -> &[user::Sub] {
        &self.members
    }

    pub const fn last_message(&self) -> Option<&LastMessage> {
        self.last_message.as_ref()
    }
}

impl From<Room> for RoomDto {
    fn from(r: Room) -> Self {
        Self {
            id: r.id,
            is_group: r.is_group(),
            name: r.name().map(String::from),
            members: r.members.into_iter().collect(),
            last_message: r.last_message,
            created_at: r.created_at,
        }
    }
}
