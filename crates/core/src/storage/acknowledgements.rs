//! Visitor rules acknowledgements
//!
//! A row records that a user accepted the visitor rules before joining
//! another dorm's event. Rows go away with the event.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, OptionalExt};
use crate::error::Result;

pub struct AcknowledgementStore<'a> {
    conn: &'a Connection,
}

impl<'a> AcknowledgementStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Record acceptance; the first acceptance time is kept
    #[instrument(skip(self))]
    pub fn record(&self, event_id: Uuid, user_id: Uuid) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO visitor_acknowledgements (event_id, user_id, acknowledged_at)
             VALUES (?1, ?2, ?3)",
            params![
                event_id.to_string(),
                user_id.to_string(),
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// When the user accepted the rules for this event, if ever
    pub fn find(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let at = self
            .conn
            .query_row(
                "SELECT acknowledged_at FROM visitor_acknowledgements
                 WHERE event_id = ?1 AND user_id = ?2",
                params![event_id.to_string(), user_id.to_string()],
                |row| parse_datetime(&row.get::<_, String>(0)?),
            )
            .optional()?;
        Ok(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DormId, Event, EventDraft, Viewer};
    use crate::storage::Database;

    #[test]
    fn test_record_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let host = Viewer::new(Uuid::new_v4(), "KTU");
        let event = Event::create(
            &host,
            EventDraft::new("Open mic".into(), DormId::from("KTU"), Utc::now(), 10),
        )
        .unwrap();
        db.events().create(&event).unwrap();

        let visitor = Uuid::new_v4();
        assert!(db.acknowledgements().find(event.id, visitor).unwrap().is_none());

        db.acknowledgements().record(event.id, visitor).unwrap();
        let first = db.acknowledgements().find(event.id, visitor).unwrap().unwrap();
        db.acknowledgements().record(event.id, visitor).unwrap();
        assert_eq!(db.acknowledgements().find(event.id, visitor).unwrap(), Some(first));

        db.events().delete(event.id).unwrap();
        assert!(db.acknowledgements().find(event.id, visitor).unwrap().is_none());
    }
}
