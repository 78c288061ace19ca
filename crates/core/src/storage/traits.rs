//! Storage repository traits
//!
//! These traits define the document store interface the participation
//! service runs against, allowing for different implementations (SQLite,
//! mock, a remote document database).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{NotificationPreferences, PatchOutcome};
use crate::error::Result;
use crate::models::{ChatMessage, DormId, Event, Profile, Viewer};
use crate::participation::EventPatch;

/// Event repository operations
pub trait EventRepository {
    /// Create a new event
    fn create_event(&self, event: &Event) -> Result<()>;

    /// Point read of an event snapshot
    fn find_event(&self, id: Uuid) -> Result<Option<Event>>;

    /// Events of a dorm plus community-wide events
    fn list_events_for_dorm(&self, dorm: &DormId) -> Result<Vec<Event>>;

    /// Events a user has joined
    fn list_events_joined_by(&self, user_id: Uuid) -> Result<Vec<Event>>;

    /// Delete an event and all data that depends on it
    fn delete_event(&self, event_id: Uuid) -> Result<bool>;

    /// Conditional membership write
    fn apply_patch(&self, patch: &EventPatch) -> Result<PatchOutcome>;
}

/// Profile repository operations
pub trait ProfileRepository {
    /// Insert or replace a profile
    fn upsert_profile(&self, profile: &Profile) -> Result<()>;

    /// Find profile by user ID
    fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>>;

    /// Resolve a signed-in user to a viewer
    fn viewer_for(&self, user_id: Uuid) -> Result<Option<Viewer>>;

    /// Profiles whose home dorm is `dorm`
    fn list_residents(&self, dorm: &DormId) -> Result<Vec<Profile>>;
}

/// Event chat operations
pub trait ChatRepository {
    /// Create a new message
    fn create_message(&self, message: &ChatMessage) -> Result<()>;

    /// Find message by ID
    fn find_message(&self, id: Uuid) -> Result<Option<ChatMessage>>;

    /// Latest messages of an event, oldest first
    fn list_messages(&self, event_id: Uuid, limit: u32) -> Result<Vec<ChatMessage>>;
}

/// Notification preference and visitor acknowledgement records
pub trait ResidentRepository {
    /// Load preferences, defaulting to everything enabled
    fn load_preferences(&self, user_id: Uuid) -> Result<NotificationPreferences>;

    /// Save preferences
    fn save_preferences(&self, prefs: &NotificationPreferences) -> Result<()>;

    /// Record that a user accepted an event's visitor rules
    fn record_acknowledgement(&self, event_id: Uuid, user_id: Uuid) -> Result<()>;

    /// When the user accepted the visitor rules, if they did
    fn find_acknowledgement(&self, event_id: Uuid, user_id: Uuid) -> Result<Option<DateTime<Utc>>>;
}

/// Combined storage interface
///
/// Provides access to all repository operations.
/// Implementations may be backed by SQLite, mocks, or network.
pub trait Storage: EventRepository + ProfileRepository + ChatRepository + ResidentRepository {}

// Blanket implementation: any type implementing all traits implements Storage
impl<T> Storage for T where T: EventRepository + ProfileRepository + ChatRepository + ResidentRepository
{}
