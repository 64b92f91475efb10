use async_trait::async_trait;
use log::{debug, error};

use crate::event::service::EventService;
use crate::fanout::Coordinator;
use crate::{event, room, user};

use super::Repository;
use super::model::{Message, NewMessage};

#[async_trait]
pub trait MessageService {
    /// Appends to the room log and fans out to the other members.
    async fn send(
        &self,
        room_id: &room::Id,
        sender: &user::Sub,
        text: &str,
    ) -> super::Result<Message>;

    async fn list(&self, room_id: &room::Id, viewer: &user::Sub) -> super::Result<Vec<Message>>;

    async fn mark_room_read(&self, room_id: &room::Id, viewer: &user::Sub)
    -> super::Result<usize>;
}

#[derive(Clone)]
pub struct MessageServiceImpl {
    repo: Repository,
    room_service: room::Service,
    event_service: EventService,
    fanout: Coordinator,
}

impl MessageServiceImpl {
    pub fn new(
        repo: Repository,
        room_service: room::Service,
        event_service: EventService,
        fanout: Coordinator,
    ) -> Self {
        Self {
            repo,
            room_service,
            event_service,
            fanout,
        }
    }
}

impl MessageServiceImpl {
    async fn find_room_of_member(
        &self,
        room_id: &room::Id,
        sub: &user::Sub,
    ) -> super::Result<room::model::Room> {
        let room = self.room_service.find_by_id(room_id).await?;
        if !room.is_member(sub) {
            return Err(super::Error::NotMember(*room_id));
        }
        Ok(room)
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    async fn send(
        &self,
        room_id: &room::Id,
        sender: &user::Sub,
        text: &str,
    ) -> super::Result<Message> {
        let room = self.room_service.find_by_id(room_id).await?;
        let new = NewMessage::try_new(*room_id, sender.clone(), text)?;

        if !room.is_member(sender) {
            return Err(super::Error::NotMember(*room_id));
        }

        let message = self.repo.append(new).await?;
        debug!("{sender} appended {} to room {room_id}", message.id());

        // the message is durable at this point
        if let Err(e) = self
            .room_service
            .record_last_message(room_id, sender, message.text(), *message.created_at())
            .await
        {
            error!("failed to record last message of room {room_id}: {e:?}");
        }

        self.fanout.message_appended(room.members(), &message).await;

        Ok(message)
    }

    async fn list(&self, room_id: &room::Id, viewer: &user::Sub) -> super::Result<Vec<Message>> {
        self.find_room_of_member(room_id, viewer).await?;
        self.repo.find_by_room(room_id).await
    }

    async fn mark_room_read(
        &self,
        room_id: &room::Id,
        viewer: &user::Sub,
    ) -> super::Result<usize> {
        self.find_room_of_member(room_id, viewer).await?;

        self.room_service.mark_read(room_id, viewer).await?;
        let updated = self
            .repo
            .mark_all_read_except_sender(room_id, viewer)
            .await?;

        self.event_service
            .broadcast_to_room(
                room_id,
                event::Event::RoomRead {
                    room_id: *room_id,
                    reader: viewer.clone(),
                },
            )
            .await;

        Ok(updated)
    }
}
