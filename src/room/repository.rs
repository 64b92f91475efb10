use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::{Insertable, Queryable, Selectable};
use diesel::{
    BoolExpressionMethods, Connection, ExpressionMethods, OptionalExtension, PgConnection,
    QueryDsl, RunQueryDsl, SelectableHelper,
};
use log::debug;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::integration::db;
use crate::schema::{rooms, rooms_members};
use crate::user;

use super::Id;
use super::model::{Departure, Kind, LastMessage, Room};

#[async_trait]
pub trait RoomRepository {
    async fn insert(&self, room: &Room) -> super::Result<()>;

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Room>>;

    async fn find_by_member(&self, sub: &user::Sub) -> super::Result<Vec<Room>>;

    async fn find_by_members(&self, a: &user::Sub, b: &user::Sub) -> super::Result<Vec<Room>>;

    /// Keeps the stored snapshot when it is newer than `msg`.
    async fn update_last_message(&self, id: &Id, msg: &LastMessage) -> super::Result<()>;

    async fn mark_last_message_read(&self, id: &Id, viewer: &user::Sub) -> super::Result<()>;

    /// Removes the member from a group and drops the group once at most one member is left.
    async fn remove_member(&self, id: &Id, sub: &user::Sub) -> super::Result<Departure>;
}

#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = rooms)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct RoomRow {
    id: Uuid,
    is_group: bool,
    name: Option<String>,
    last_sender: Option<String>,
    last_text: Option<String>,
    last_is_read: Option<bool>,
    last_at: Option<NaiveDateTime>,
    created_at: NaiveDateTime,
}

impl RoomRow {
    fn new(r: &Room) -> Self {
        let last = r.last_message();
        Self {
            id: *r.id().get(),
            is_group: r.is_group(),
            name: r.name().map(String::from),
            last_sender: last.map(|m| m.sender().to_string()),
            last_text: last.map(|m| m.text().to_owned()),
            last_is_read: last.map(LastMessage::is_read),
            last_at: last.map(|m| m.timestamp().naive_utc()),
            created_at: r.created_at().naive_utc(),
        }
    }

    fn into_room(self, members: BTreeSet<user::Sub>) -> Room {
        let kind = match (self.is_group, self.name) {
            (true, name) => Kind::Group {
                name: name.unwrap_or_default(),
            },
            (false, _) => Kind::Direct,
        };

        let last_message = match (self.last_sender, self.last_text, self.last_at) {
            (Some(sender), Some(text), Some(at)) => Some(LastMessage::restore(
                user::Sub::from(sender),
                text,
                self.last_is_read.unwrap_or(false),
                at.and_utc(),
            )),
            _ => None,
        };

        Room::restore(
            Id::from(self.id),
            kind,
            members,
            last_message,
            self.created_at.and_utc(),
        )
    }
}

#[derive(Insertable)]
#[diesel(table_name = rooms_members)]
struct MemberRow<'a> {
    room_id: Uuid,
    member: &'a str,
}

pub struct PgRoomRepository {
    pool: db::Pool,
}

impl PgRoomRepository {
    pub fn new(pool: db::Pool) -> Self {
        Self { pool }
    }
}

fn load_rooms(conn: &mut PgConnection, ids: Vec<Uuid>) -> super::Result<Vec<Room>> {
    let rows = rooms::table
        .filter(rooms::id.eq_any(ids.clone()))
        .order(rooms::created_at.asc())
        .select(RoomRow::as_select())
        .load::<RoomRow>(conn)?;

    let members = rooms_members::table
        .filter(rooms_members::room_id.eq_any(ids))
        .select((rooms_members::room_id, rooms_members::member))
        .load::<(Uuid, String)>(conn)?;

    let mut by_room: HashMap<Uuid, BTreeSet<user::Sub>> = HashMap::new();
    for (room_id, member) in members {
        by_room
            .entry(room_id)
            .or_default()
            .insert(user::Sub::from(member));
    }

    let rooms = rows
        .into_iter()
        .map(|row| {
            let members = by_room.remove(&row.id).unwrap_or_default();
            row.into_room(members)
        })
        .collect();

    Ok(rooms)
}

fn room_ids_of(conn: &mut PgConnection, sub: &user::Sub) -> super::Result<Vec<Uuid>> {
    let ids = rooms_members::table
        .filter(rooms_members::member.eq(sub.as_str()))
        .select(rooms_members::room_id)
        .load::<Uuid>(conn)?;
    Ok(ids)
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    async fn insert(&self, room: &Room) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, super::Error, _>(|conn| {
            diesel::insert_into(rooms::table)
                .values(&RoomRow::new(room))
                .execute(conn)?;

            let members = room
                .members()
                .iter()
                .map(|m| MemberRow {
                    room_id: *room.id().get(),
                    member: m.as_str(),
                })
                .collect::<Vec<_>>();

            diesel::insert_into(rooms_members::table)
                .values(&members)
                .execute(conn)?;

            Ok(())
        })
    }

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Room>> {
        let mut conn = self.pool.get()?;
        let mut rooms = load_rooms(&mut conn, vec![*id.get()])?;
        Ok(rooms.pop())
    }

    async fn find_by_member(&self, sub: &user::Sub) -> super::Result<Vec<Room>> {
        let mut conn = self.pool.get()?;
        let ids = room_ids_of(&mut conn, sub)?;
        load_rooms(&mut conn, ids)
    }

    async fn find_by_members(&self, a: &user::Sub, b: &user::Sub) -> super::Result<Vec<Room>> {
        let mut conn = self.pool.get()?;

        let of_b = room_ids_of(&mut conn, b)?;
        let ids = rooms_members::table
            .filter(
                rooms_members::member
                    .eq(a.as_str())
                    .and(rooms_members::room_id.eq_any(of_b)),
            )
            .select(rooms_members::room_id)
            .load::<Uuid>(&mut conn)?;

        load_rooms(&mut conn, ids)
    }

    async fn update_last_message(&self, id: &Id, msg: &LastMessage) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        let at = msg.timestamp().naive_utc();

        let updated = diesel::update(
            rooms::table
                .find(*id.get())
                .filter(rooms::last_at.is_null().or(rooms::last_at.le(at))),
        )
        .set((
            rooms::last_sender.eq(Some(msg.sender().as_str())),
            rooms::last_text.eq(Some(msg.text())),
            rooms::last_is_read.eq(Some(msg.is_read())),
            rooms::last_at.eq(Some(at)),
        ))
        .execute(&mut conn)?;

        if updated > 0 {
            return Ok(());
        }

        // either the room is gone or it already holds a newer snapshot
        let exists = rooms::table
            .find(*id.get())
            .select(rooms::id)
            .first::<Uuid>(&mut conn)
            .optional()?
            .is_some();

        if !exists {
            return Err(super::Error::NotFound(*id));
        }
        debug!("kept newer last message of room {id}");
        Ok(())
    }

    async fn mark_last_message_read(&self, id: &Id, viewer: &user::Sub) -> super::Result<()> {
        let mut conn = self.pool.get()?;

        conn.transaction::<_, super::Error, _>(|conn| {
            let last_sender = rooms::table
                .find(*id.get())
                .select(rooms::last_sender)
                .for_update()
                .first::<Option<String>>(conn)
                .optional()?
                .ok_or(super::Error::NotFound(*id))?;

            match last_sender {
                Some(sender) if sender != viewer.as_str() => {
                    diesel::update(rooms::table.find(*id.get()))
                        .set(rooms::last_is_read.eq(Some(true)))
                        .execute(conn)?;
                }
                _ => {}
            }

            Ok(())
        })
    }

    async fn remove_member(&self, id: &Id, sub: &user::Sub) -> super::Result<Departure> {
        let mut conn = self.pool.get()?;
        let room_id = *id.get();

        conn.transaction::<_, super::Error, _>(|conn| {
            let is_group = rooms::table
                .find(room_id)
                .select(rooms::is_group)
                .for_update()
                .first::<bool>(conn)
                .optional()?;

            match is_group {
                None => return Err(super::Error::NotFound(*id)),
                Some(false) => return Err(super::Error::NotGroup(*id)),
                Some(true) => {}
            }

            let removed = diesel::delete(
                rooms_members::table.filter(
                    rooms_members::room_id
                        .eq(room_id)
                        .and(rooms_members::member.eq(sub.as_str())),
                ),
            )
            .execute(conn)?;

            if removed == 0 {
                return Ok(Departure::UNCHANGED);
            }

            let remaining = rooms_members::table
                .filter(rooms_members::room_id.eq(room_id))
                .count()
                .get_result::<i64>(conn)?;

            if remaining > 1 {
                return Ok(Departure::LEFT);
            }

            diesel::delete(rooms_members::table.filter(rooms_members::room_id.eq(room_id)))
                .execute(conn)?;
            diesel::delete(rooms::table.find(room_id)).execute(conn)?;

            Ok(Departure::DELETED)
        })
    }
}

#[derive(Default)]
pub struct InMemoryRoomRepository {
    rooms: RwLock<HashMap<Id, Room>>,
}

impl InMemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    async fn insert(&self, room: &Room) -> super::Result<()> {
        self.rooms.write().await.insert(*room.id(), room.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &Id) -> super::Result<Option<Room>> {
        Ok(self.rooms.read().await.get(id).cloned())
    }

    async fn find_by_member(&self, sub: &user::Sub) -> super::Result<Vec<Room>> {
        let rooms = self.rooms.read().await;
        let mut found = rooms
            .values()
            .filter(|r| r.is_member(sub))
            .cloned()
            .collect::<Vec<_>>();
        found.sort_by_key(|r| *r.created_at());
        Ok(found)
    }

    async fn find_by_members(&self, a: &user::Sub, b: &user::Sub) -> super::Result<Vec<Room>> {
        let found = self.find_by_member(a).await?;
        Ok(found.into_iter().filter(|r| r.is_member(b)).collect())
    }

    async fn update_last_message(&self, id: &Id, msg: &LastMessage) -> super::Result<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(id).ok_or(super::Error::NotFound(*id))?;
        if room
            .last_message()
            .is_none_or(|current| current.timestamp() <= msg.timestamp())
        {
            room.set_last_message(msg.clone());
        }
        Ok(())
    }

    async fn mark_last_message_read(&self, id: &Id, viewer: &user::Sub) -> super::Result<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(id).ok_or(super::Error::NotFound(*id))?;
        if let Some(msg) = room.last_message_mut() {
            msg.mark_read_by(viewer);
        }
        Ok(())
    }

    async fn remove_member(&self, id: &Id, sub: &user::Sub) -> super::Result<Departure> {
        let mut rooms = self.rooms.write().await;
        let room = rooms.get_mut(id).ok_or(super::Error::NotFound(*id))?;

        if !room.is_group() {
            return Err(super::Error::NotGroup(*id));
        }

        if !room.remove_member(sub) {
            return Ok(Departure::UNCHANGED);
        }

        if room.members().len() > 1 {
            return Ok(Departure::LEFT);
        }

        rooms.remove(id);
        Ok(Departure::DELETED)
    }
}
