//! SQLite storage layer for Dormhub

mod acknowledgements;
mod events;
mod messages;
mod migrations;
mod parse;
mod preferences;
mod profiles;
mod traits;

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::instrument;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::models::{ChatMessage, DormId, Event, Profile, Viewer};
use crate::participation::EventPatch;

pub use acknowledgements::AcknowledgementStore;
pub use events::{EventStore, PatchOutcome};
pub use messages::MessageStore;
pub use preferences::{NotificationPreferences, PreferencesStore};
pub use profiles::ProfileStore;
pub use traits::{
    ChatRepository, EventRepository, ProfileRepository, ResidentRepository, Storage,
};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &StoreConfig::default())
    }

    /// Open or create database at the given path with store settings
    #[instrument(skip(path, config), fields(path = %path.as_ref().display()))]
    pub fn open_with<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(config.busy_timeout())?;
        Self::init(conn)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Enable foreign keys and bring the schema up to date
    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Get current schema version
    pub fn schema_version(&self) -> Result<u32> {
        migrations::current_version(&self.conn)
    }

    pub fn events(&self) -> EventStore<'_> {
        EventStore::new(&self.conn)
    }

    pub fn profiles(&self) -> ProfileStore<'_> {
        ProfileStore::new(&self.conn)
    }

    pub fn messages(&self) -> MessageStore<'_> {
        MessageStore::new(&self.conn)
    }

    pub fn preferences(&self) -> PreferencesStore<'_> {
        PreferencesStore::new(&self.conn)
    }

    pub fn acknowledgements(&self) -> AcknowledgementStore<'_> {
        AcknowledgementStore::new(&self.conn)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl EventRepository for Database {
    fn create_event(&self, event: &Event) -> Result<()> {
        self.events().create(event)
    }

    fn find_event(&self, id: Uuid) -> Result<Option<Event>> {
        self.events().find_by_id(id)
    }

    fn list_events_for_dorm(&self, dorm: &DormId) -> Result<Vec<Event>> {
        self.events().list_for_dorm(dorm)
    }

    fn list_events_joined_by(&self, user_id: Uuid) -> Result<Vec<Event>> {
        self.events().list_joined_by(user_id)
    }

    fn delete_event(&self, event_id: Uuid) -> Result<bool> {
        self.events().delete(event_id)
    }

    fn apply_patch(&self, patch: &EventPatch) -> Result<PatchOutcome> {
        self.events().apply_patch(patch)
    }
}

impl ProfileRepository for Database {
    fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.profiles().upsert(profile)
    }

    fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
        self.profiles().find_by_id(user_id)
    }

    fn viewer_for(&self, user_id: Uuid) -> Result<Option<Viewer>> {
        self.profiles().viewer_for(user_id)
    }

    fn list_residents(&self, dorm: &DormId) -> Result<Vec<Profile>> {
        self.profiles().list_residents(dorm)
    }
}

impl ChatRepository for Database {
    fn create_message(&self, message: &ChatMessage) -> Result<()> {
        self.messages().create(message)
    }

    fn find_message(&self, id: Uuid) -> Result<Option<ChatMessage>> {
        self.messages().find_by_id(id)
    }

    fn list_messages(&self, event_id: Uuid, limit: u32) -> Result<Vec<ChatMessage>> {
        self.messages().list_for_event(event_id, limit)
    }
}

impl ResidentRepository for Database {
    fn load_preferences(&self, user_id: Uuid) -> Result<NotificationPreferences> {
        self.preferences().load(user_id)
    }

    fn save_preferences(&self, prefs: &NotificationPreferences) -> Result<()> {
        self.preferences().save(prefs)
    }

    fn record_acknowledgement(&self, event_id: Uuid, user_id: Uuid) -> Result<()> {
        self.acknowledgements().record(event_id, user_id)
    }

    fn find_acknowledgement(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        self.acknowledgements().find(event_id, user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    use crate::models::EventDraft;
    use tempfile::tempdir;

    #[test]
    fn test_file_database_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dormhub.db");
        let host = Viewer::new(Uuid::new_v4(), "KTU");
        let event = Event::create(
            &host,
            EventDraft::new("Sauna evening".into(), DormId::from("KTU"), Utc::now(), 6),
        )
        .unwrap();

        {
            let db = Database::open(&path).unwrap();
            db.create_event(&event).unwrap();
        }

        let reopened = Database::open(&path).unwrap();
        assert!(reopened.schema_version().unwrap() > 0);
        assert_eq!(reopened.find_event(event.id).unwrap().unwrap().title, "Sauna evening");
    }

    #[test]
    fn test_concurrent_joins_never_exceed_capacity() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("race.db");
        let host = Viewer::new(Uuid::new_v4(), DormId::GENERAL);
        let event = Event::create(
            &host,
            EventDraft::new("Last seat".into(), DormId::general(), Utc::now(), 3),
        )
        .unwrap();
        Database::open(&path).unwrap().create_event(&event).unwrap();

        let writers = 8;
        let barrier = Arc::new(Barrier::new(writers));
        let handles: Vec<_> = (0..writers)
            .map(|_| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                let event_id = event.id;
                thread::spawn(move || {
                    let db = Database::open(&path).unwrap();
                    barrier.wait();
                    db.apply_patch(&EventPatch::join(event_id, Uuid::new_v4(), false, None))
                        .unwrap()
                })
            })
            .collect();

        let outcomes: Vec<PatchOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let applied = outcomes.iter().filter(|o| **o == PatchOutcome::Applied).count();

        assert_eq!(applied, 3);
        let stored = Database::open(&path).unwrap().find_event(event.id).unwrap().unwrap();
        assert_eq!(stored.participants.len(), 3);
    }
}
