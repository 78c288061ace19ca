//! Notification preference persistence
//!
//! Users without a stored row get every notification.

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::parse::OptionalExt;
use crate::error::Result;

/// Which notifications a user wants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    /// Someone joined an event this user hosts
    pub event_joins: bool,
    /// A new event was announced in this user's dorm
    pub new_events: bool,
}

impl NotificationPreferences {
    pub fn defaults(user_id: Uuid) -> Self {
        Self {
            user_id,
            event_joins: true,
            new_events: true,
        }
    }
}

/// Preferences store
pub struct PreferencesStore<'a> {
    conn: &'a Connection,
}

impl<'a> PreferencesStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Save notification preferences
    pub fn save(&self, prefs: &NotificationPreferences) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO notification_preferences (user_id, event_joins, new_events, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                prefs.user_id.to_string(),
                prefs.event_joins as i32,
                prefs.new_events as i32,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Load preferences, falling back to defaults
    pub fn load(&self, user_id: Uuid) -> Result<NotificationPreferences> {
        let stored = self
            .conn
            .query_row(
                "SELECT event_joins, new_events FROM notification_preferences WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| {
                    Ok(NotificationPreferences {
                        user_id,
                        event_joins: row.get::<_, i32>(0)? != 0,
                        new_events: row.get::<_, i32>(1)? != 0,
                    })
                },
            )
            .optional()?;

        Ok(stored.unwrap_or_else(|| NotificationPreferences::defaults(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_preferences_save_load() {
        let db = Database::open_in_memory().unwrap();
        let user_id = Uuid::new_v4();

        let prefs = NotificationPreferences {
            user_id,
            event_joins: false,
            new_events: true,
        };
        db.preferences().save(&prefs).unwrap();

        assert_eq!(db.preferences().load(user_id).unwrap(), prefs);
    }

    #[test]
    fn test_preferences_default_when_missing() {
        let db = Database::open_in_memory().unwrap();
        let user_id = Uuid::new_v4();
        assert_eq!(
            db.preferences().load(user_id).unwrap(),
            NotificationPreferences::defaults(user_id)
        );
    }
}
