use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::notification::model::Notification;
use crate::{room, user};

/// Inbound frame.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    Identify {
        user_id: user::Sub,
    },
    JoinRoom {
        room_id: room::Id,
    },
    LeaveRoom {
        room_id: room::Id,
    },
    SendMessage {
        sender_id: user::Sub,
        #[serde(default)]
        receiver_id: Option<user::Sub>,
        #[serde(default)]
        room_id: Option<room::Id>,
        text: String,
    },
}

/// Outbound frame.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ActiveUsers {
        users: BTreeSet<user::Sub>,
    },
    MessageReceived {
        sender_id: user::Sub,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<room::Id>,
    },
    NotificationPushed {
        notification: Notification,
    },
    RoomRead {
        room_id: room::Id,
        reader: user::Sub,
    },
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn should_parse_send_message_without_room() {
        let cmd: Command = serde_json::from_value(json!({
            "type": "send_message",
            "sender_id": "jora",
            "receiver_id": "valera",
            "text": "hi"
        }))
        .unwrap();

        match cmd {
            Command::SendMessage {
                receiver_id,
                room_id,
                ..
            } => {
                assert_eq!(receiver_id, Some(user::Sub::from("valera")));
                assert!(room_id.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn should_reject_unknown_command() {
        let res = serde_json::from_value::<Command>(json!({ "type": "typing" }));
        assert!(res.is_err());
    }

    #[test]
    fn should_tag_events() {
        let e = Event::ActiveUsers {
            users: BTreeSet::from([user::Sub::from("valera"), user::Sub::from("jora")]),
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({ "type": "active_users", "users": ["jora", "valera"] })
        );

        let e = Event::MessageReceived {
            sender_id: user::Sub::from("jora"),
            text: "hi".to_owned(),
            room_id: None,
        };
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            json!({ "type": "message_received", "sender_id": "jora", "text": "hi" })
        );
    }
}
