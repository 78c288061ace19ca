//! Event chat storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, parse_uuid_opt, OptionalExt};
use crate::error::Result;
use crate::models::ChatMessage;

pub struct MessageStore<'a> {
    conn: &'a Connection,
}

impl<'a> MessageStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new message
    #[instrument(skip(self, message), fields(event_id = %message.event_id))]
    pub fn create(&self, message: &ChatMessage) -> Result<()> {
        self.conn.execute(
            "INSERT INTO event_messages
                 (id, event_id, sender_id, content, reply_to, is_anonymous, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.to_string(),
                message.event_id.to_string(),
                message.sender_id.to_string(),
                message.content,
                message.reply_to.map(|id| id.to_string()),
                message.is_anonymous,
                message.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get message by ID
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<ChatMessage>> {
        let message = self
            .conn
            .query_row(
                "SELECT id, event_id, sender_id, content, reply_to, is_anonymous, created_at
                 FROM event_messages WHERE id = ?1",
                params![id.to_string()],
                message_from_row,
            )
            .optional()?;
        Ok(message)
    }

    /// The latest `limit` messages of an event, oldest first
    #[instrument(skip(self))]
    pub fn list_for_event(&self, event_id: Uuid, limit: u32) -> Result<Vec<ChatMessage>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, sender_id, content, reply_to, is_anonymous, created_at FROM (
                 SELECT * FROM event_messages WHERE event_id = ?1
                 ORDER BY seq DESC LIMIT ?2
             ) ORDER BY seq ASC",
        )?;
        let messages = stmt
            .query_map(params![event_id.to_string(), limit], message_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        event_id: parse_uuid(&row.get::<_, String>(1)?)?,
        sender_id: parse_uuid(&row.get::<_, String>(2)?)?,
        content: row.get(3)?,
        reply_to: parse_uuid_opt(row.get::<_, Option<String>>(4)?)?,
        is_anonymous: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?)?,
    })
}
