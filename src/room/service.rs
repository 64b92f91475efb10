use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;

use crate::user;

use super::model::{Departure, LastMessage, Room};
use super::{Id, Repository};

#[async_trait]
pub trait RoomService {
    async fn create_direct(&self, a: &user::Sub, b: &user::Sub) -> super::Result<Room>;

    async fn create_group(
        &self,
        creator: &user::Sub,
        name: &str,
        member_ids: &[user::Sub],
    ) -> super::Result<Room>;

    async fn find_by_id(&self, id: &Id) -> super::Result<Room>;

    async fn list_for_user(&self, sub: &user::Sub) -> super::Result<Vec<Room>>;

    async fn find_between(&self, a: &user::Sub, b: &user::Sub) -> super::Result<Vec<Room>>;

    async fn record_last_message(
        &self,
        id: &Id,
        sender: &user::Sub,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> super::Result<()>;

    async fn mark_read(&self, id: &Id, viewer: &user::Sub) -> super::Result<()>;

    async fn leave_group(&self, id: &Id, sub: &user::Sub) -> super::Result<Departure>;
}

#[derive(Clone)]
pub struct RoomServiceImpl {
    repo: Repository,
}

impl RoomServiceImpl {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RoomService for RoomServiceImpl {
    async fn create_direct(&self, a: &user::Sub, b: &user::Sub) -> super::Result<Room> {
        if a.eq(b) {
            return Err(super::Error::SelfChat);
        }

        let room = Room::direct(a.clone(), b.clone());
        self.repo.insert(&room).await?;
        debug!("direct room {} created for {a} and {b}", room.id());
        Ok(room)
    }

    async fn create_group(
        &self,
        creator: &user::Sub,
        name: &str,
        member_ids: &[user::Sub],
    ) -> super::Result<Room> {
        let name = name.trim();
        if name.is_empty() {
            return Err(super::Error::MissingName);
        }

        let mut members = member_ids.iter().cloned().collect::<BTreeSet<_>>();
        members.insert(creator.clone());

        if members.len() < 2 {
            return Err(super::Error::NotEnoughMembers(members.len()));
        }

        let room = Room::group(name, members);
        self.repo.insert(&room).await?;
        debug!("group {} '{name}' created by {creator}", room.id());
        Ok(room)
    }

    async fn find_by_id(&self, id: &Id) -> super::Result<Room> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(super::Error::NotFound(*id))
    }

    async fn list_for_user(&self, sub: &user::Sub) -> super::Result<Vec<Room>> {
        self.repo.find_by_member(sub).await
    }

    async fn find_between(&self, a: &user::Sub, b: &user::Sub) -> super::Result<Vec<Room>> {
        self.repo.find_by_members(a, b).await
    }

    async fn record_last_message(
        &self,
        id: &Id,
        sender: &user::Sub,
        text: &str,
        timestamp: DateTime<Utc>,
    ) -> super::Result<()> {
        let last = LastMessage::new(sender.clone(), text, timestamp);
        self.repo.update_last_message(id, &last).await
    }

    async fn mark_read(&self, id: &Id, viewer: &user::Sub) -> super::Result<()> {
        self.repo.mark_last_message_read(id, viewer).await
    }

    async fn leave_group(&self, id: &Id, sub: &user::Sub) -> super::Result<Departure> {
        let departure = self.repo.remove_member(id, sub).await?;
        if departure.deleted {
            debug!("group {id} deleted after {sub} left");
        }
        Ok(departure)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::room::repository::InMemoryRoomRepository;
    use crate::room::{self, Service};

    use super::*;

    fn service() -> Service {
        Arc::new(RoomServiceImpl::new(Arc::new(InMemoryRoomRepository::new())))
    }

    fn sub(s: &str) -> user::Sub {
        user::Sub::from(s)
    }

    #[tokio::test]
    async fn should_reject_chat_with_self() {
        let res = service().create_direct(&sub("jora"), &sub("jora")).await;
        assert!(matches!(res, Err(room::Error::SelfChat)));
    }

    #[tokio::test]
    async fn should_allow_duplicate_direct_rooms() {
        let s = service();
        s.create_direct(&sub("jora"), &sub("valera")).await.unwrap();
        s.create_direct(&sub("valera"), &sub("jora")).await.unwrap();

        let between = s.find_between(&sub("jora"), &sub("valera")).await.unwrap();
        assert_eq!(between.len(), 2);
    }

    #[tokio::test]
    async fn should_add_creator_to_group() {
        let s = service();
        let g = s
            .create_group(&sub("jora"), " Team ", &[sub("valera")])
            .await
            .unwrap();

        assert_eq!(g.name(), Some("Team"));
        assert!(g.is_member(&sub("jora")));
        assert_eq!(g.members().len(), 2);
    }

    #[tokio::test]
    async fn should_validate_group() {
        let s = service();

        let res = s.create_group(&sub("jora"), "  ", &[sub("valera")]).await;
        assert!(matches!(res, Err(room::Error::MissingName)));

        let res = s
            .create_group(&sub("jora"), "Solo", &[sub("jora"), sub("jora")])
            .await;
        assert!(matches!(res, Err(room::Error::NotEnoughMembers(1))));
    }

    #[tokio::test]
    async fn should_mark_read_only_for_other_member() {
        let s = service();
        let r = s.create_direct(&sub("jora"), &sub("valera")).await.unwrap();
        s.record_last_message(r.id(), &sub("jora"), "hi", Utc::now())
            .await
            .unwrap();

        s.mark_read(r.id(), &sub("jora")).await.unwrap();
        let last = s.find_by_id(r.id()).await.unwrap();
        assert!(!last.last_message().unwrap().is_read());

        s.mark_read(r.id(), &sub("valera")).await.unwrap();
        s.mark_read(r.id(), &sub("valera")).await.unwrap();
        let last = s.find_by_id(r.id()).await.unwrap();
        assert!(last.last_message().unwrap().is_read());
    }

    #[tokio::test]
    async fn should_reset_read_flag_on_new_message() {
        let s = service();
        let r = s.create_direct(&sub("jora"), &sub("valera")).await.unwrap();
        s.record_last_message(r.id(), &sub("jora"), "hi", Utc::now())
            .await
            .unwrap();
        s.mark_read(r.id(), &sub("valera")).await.unwrap();

        s.record_last_message(r.id(), &sub("valera"), "hey", Utc::now())
            .await
            .unwrap();

        let room = s.find_by_id(r.id()).await.unwrap();
        let last = room.last_message().unwrap();
        assert_eq!(last.text(), "hey");
        assert!(!last.is_read());
    }

    #[tokio::test]
    async fn should_report_missing_room() {
        let s = service();
        let id = Id::random();

        assert!(matches!(
            s.find_by_id(&id).await,
            Err(room::Error::NotFound(_))
        ));
        assert!(matches!(
            s.mark_read(&id, &sub("jora")).await,
            Err(room::Error::NotFound(_))
        ));
        assert!(matches!(
            s.leave_group(&id, &sub("jora")).await,
            Err(room::Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_leave_group_until_deleted() {
        let s = service();
        let g = s
            .create_group(&sub("jora"), "Team", &[sub("valera"), sub("igor")])
            .await
            .unwrap();

        assert_eq!(
            s.leave_group(g.id(), &sub("stranger")).await.unwrap(),
            Departure::UNCHANGED
        );
        assert_eq!(
            s.leave_group(g.id(), &sub("igor")).await.unwrap(),
            Departure::LEFT
        );
        assert!(s.list_for_user(&sub("igor")).await.unwrap().is_empty());

        assert_eq!(
            s.leave_group(g.id(), &sub("valera")).await.unwrap(),
            Departure::DELETED
        );
        assert!(matches!(
            s.find_by_id(g.id()).await,
            Err(room::Error::NotFound(_))
        ));
    }
}
