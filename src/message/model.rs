use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{room, user};

use super::Id;

/// A message that passed validation but has not been appended yet.
#[derive(Clone, Debug)]
pub struct NewMessage {
    room_id: room::Id,
    sender: user::Sub,
    text: String,
}

impl NewMessage {
    pub fn try_new(
        room_id: room::Id,
        sender: user::Sub,
        text: impl Into<String>,
    ) -> super::Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(super::Error::EmptyText);
        }

        Ok(Self {
            room_id,
            sender,
            text,
        })
    }

    pub const fn room_id(&self) -> &room::Id {
        &self.room_id
    }

    pub const fn sender(&self) -> &user::Sub {
        &self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Stamps the message, never going back in time relative to `last`.
    pub fn into_message(self, now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> Message {
        let created_at = match last {
            Some(last) if last > now => last,
            _ => now,
        };

        Message {
            id: Id::random(),
            room_id: self.room_id,
            sender: self.sender,
            text: self.text,
            is_read: false,
            created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    id: Id,
    room_id: room::Id,
    sender: user::Sub,
    text: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl Message {
    pub(super) fn restore(
        id: Id,
        room_id: room::Id,
        sender: user::Sub,
        text: String,
        is_read: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            room_id,
            sender,
            text,
            is_read,
            created_at,
        }
    }

    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub const fn room_id(&self) -> &room::Id {
        &self.room_id
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

    pub const fn created_at(&self) -> &DateTime<Utc> {
        &self.created_at
    }

    pub(super) fn mark_read(&mut self) {
        self.is_read = true;
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    #[test]
    fn should_reject_blank_text() {
        let res = NewMessage::try_new(room::Id::random(), user::Sub::from("jora"), " \n\t ");
        assert!(matches!(res, Err(crate::message::Error::EmptyText)));
    }

    #[test]
    fn should_keep_text_as_is() {
        let msg = NewMessage::try_new(room::Id::random(), user::Sub::from("jora"), " hi ")
            .unwrap()
            .into_message(Utc::now(), None);
        assert_eq!(msg.text(), " hi ");
        assert!(!msg.is_read());
    }

    #[test]
    fn should_not_go_back_in_time() {
        let now = Utc::now();
        let ahead = now + Duration::seconds(3);
        let new = NewMessage::try_new(room::Id::random(), user::Sub::from("jora"), "hi").unwrap();

        assert_eq!(new.clone().into_message(now, Some(ahead)).created_at(), &ahead);
        assert_eq!(
            new.into_message(now, Some(now - Duration::seconds(3)))
                .created_at(),
            &now
        );
    }
}
