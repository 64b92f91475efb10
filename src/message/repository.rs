use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use diesel::dsl::max;
use diesel::prelude::{Insertable, Queryable, Selectable};
use diesel::{
    Connection, ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl, SelectableHelper,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::integration::db;
use crate::schema::{messages, rooms};
use crate::{room, user};

use super::Id;
use super::model::{Message, NewMessage};

#[async_trait]
pub trait MessageRepository {
    async fn append(&self, msg: NewMessage) -> super::Result<Message>;

    /// Oldest first, ties broken by append order.
    async fn find_by_room(&self, room_id: &room::Id) -> super::Result<Vec<Message>>;

    async fn mark_all_read_except_sender(
        &self,
        room_id: &room::Id,
        reader: &user::Sub,
    ) -> super::Result<usize>;
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct MessageRow {
    id: Uuid,
    room_id: Uuid,
    sender: String,
    text: String,
    is_read: bool,
    created_at: NaiveDateTime,
}

impl From<MessageRow> for Message {
    fn from(r: MessageRow) -> Self {
        Message::restore(
            Id::from(r.id),
            room::Id::from(r.room_id),
            user::Sub::from(r.sender),
            r.text,
            r.is_read,
            r.created_at.and_utc(),
        )
    }
}

#[derive(Insertable)]
#[diesel(table_name = messages)]
struct NewMessageRow<'a> {
    id: Uuid,
    room_id: Uuid,
    sender: &'a str,
    text: &'a str,
    is_read: bool,
    created_at: NaiveDateTime,
}

impl<'a> From<&'a Message> for NewMessageRow<'a> {
    fn from(m: &'a Message) -> Self {
        Self {
            id: *m.id().get(),
            room_id: *m.room_id().get(),
            sender: m.sender().as_str(),
            text: m.text(),
            is_read: m.is_read(),
            created_at: m.created_at().naive_utc(),
        }
    }
}

pub struct PgMessageRepository {
    pool: db::Pool,
}

impl PgMessageRepository {
    pub fn new(pool: db::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(&self, msg: NewMessage) -> super::Result<Message> {
        let mut conn = self.pool.get()?;
        let room_id = *msg.room_id().get();

        conn.transaction::<_, super::Error, _>(|conn| {
            // serializes appends to the same room
            rooms::table
                .find(room_id)
                .select(rooms::id)
                .for_update()
                .first::<Uuid>(conn)
                .optional()?;

            let last = messages::table
                .filter(messages::room_id.eq(room_id))
                .select(max(messages::created_at))
                .first::<Option<NaiveDateTime>>(conn)?;

            let message = msg.into_message(Utc::now(), last.map(|t| t.and_utc()));

            diesel::insert_into(messages::table)
                .values(NewMessageRow::from(&message))
                .execute(conn)?;

            Ok(message)
        })
    }

    async fn find_by_room(&self, room_id: &room::Id) -> super::Result<Vec<Message>> {
        let mut conn = self.pool.get()?;

        let rows = messages::table
            .filter(messages::room_id.eq(room_id.get()))
            .order((messages::created_at.asc(), messages::seq.asc()))
            .select(MessageRow::as_select())
            .load::<MessageRow>(&mut conn)?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn mark_all_read_except_sender(
        &self,
        room_id: &room::Id,
        reader: &user::Sub,
    ) -> super::Result<usize> {
        let mut conn = self.pool.get()?;

        let updated = diesel::update(
            messages::table
                .filter(messages::room_id.eq(room_id.get()))
                .filter(messages::sender.ne(reader.as_str()))
                .filter(messages::is_read.eq(false)),
        )
        .set(messages::is_read.eq(true))
        .execute(&mut conn)?;

        Ok(updated)
    }
}

#[derive(Default)]
pub struct InMemoryMessageRepository {
    rooms: RwLock<HashMap<room::Id, Vec<Message>>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageRepository {
    async fn append(&self, msg: NewMessage) -> super::Result<Message> {
        let mut rooms = self.rooms.write().await;
        let log = rooms.entry(*msg.room_id()).or_default();

        let last = log.last().map(|m| *m.created_at());
        let message = msg.into_message(Utc::now(), last);
        log.push(message.clone());

        Ok(message)
    }

    async fn find_by_room(&self, room_id: &room::Id) -> super::Result<Vec<Message>> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room_id).cloned().unwrap_or_default())
    }

    async fn mark_all_read_except_sender(
        &self,
        room_id: &room::Id,
        reader: &user::Sub,
    ) -> super::Result<usize> {
        let mut rooms = self.rooms.write().await;
        let Some(log) = rooms.get_mut(room_id) else {
            return Ok(0);
        };

        let mut updated = 0;
        for m in log
            .iter_mut()
            .filter(|m| !m.is_read() && m.sender().ne(reader))
        {
            m.mark_read();
            updated += 1;
        }

        Ok(updated)
    }
}
