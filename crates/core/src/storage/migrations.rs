//! Database migration system
//!
//! Tracks schema versions and applies migrations in order.

use rusqlite::Connection;
use tracing::{info, instrument};

use crate::error::Result;

/// A database migration
pub struct Migration {
    /// Version number (must be sequential starting from 1)
    pub version: u32,
    /// Description of what this migration does
    pub description: &'static str,
    /// SQL to run for this migration
    pub sql: &'static str,
}

/// All migrations in order
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Resident profiles (identity provider attributes)
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                photo_url TEXT,
                home_dorm TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- Events table
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                location TEXT,
                starts_at TEXT NOT NULL,
                image_url TEXT,
                owner_dorm TEXT NOT NULL,
                host_id TEXT NOT NULL,
                is_host_resident INTEGER NOT NULL,
                residents_only INTEGER NOT NULL DEFAULT 0,
                is_esn INTEGER NOT NULL DEFAULT 0,
                capacity INTEGER NOT NULL CHECK (capacity > 0),
                desired_count INTEGER,
                -- JSON array of registration field descriptors
                registration_fields TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );

            -- Participants; seq gives stable display order
            CREATE TABLE IF NOT EXISTS event_participants (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                is_anonymous INTEGER NOT NULL DEFAULT 0,
                joined_at TEXT NOT NULL,
                FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE,
                UNIQUE(event_id, user_id)
            );

            -- Registration responses (JSON object of field id -> answer)
            CREATE TABLE IF NOT EXISTS event_responses (
                event_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                answers TEXT NOT NULL,
                submitted_at TEXT NOT NULL,
                PRIMARY KEY (event_id, user_id),
                FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE
            );
        "#,
    },
    Migration {
        version: 2,
        description: "Add indexes for query performance",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_events_owner_dorm ON events(owner_dorm);
            CREATE INDEX IF NOT EXISTS idx_events_starts ON events(starts_at);
            CREATE INDEX IF NOT EXISTS idx_participants_event ON event_participants(event_id);
            CREATE INDEX IF NOT EXISTS idx_participants_user ON event_participants(user_id);
        "#,
    },
    Migration {
        version: 3,
        description: "Add event chat messages",
        sql: r#"
            CREATE TABLE IF NOT EXISTS event_messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                event_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                content TEXT NOT NULL,
                reply_to TEXT,
                is_anonymous INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_event_messages_event ON event_messages(event_id, seq);
        "#,
    },
    Migration {
        version: 4,
        description: "Add notification preferences",
        sql: r#"
            CREATE TABLE IF NOT EXISTS notification_preferences (
                user_id TEXT PRIMARY KEY,
                event_joins INTEGER NOT NULL DEFAULT 1,
                new_events INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 5,
        description: "Add visitor rules acknowledgements",
        sql: r#"
            -- One row per (event, user) once the visitor rules were accepted
            CREATE TABLE IF NOT EXISTS visitor_acknowledgements (
                event_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                acknowledged_at TEXT NOT NULL,
                PRIMARY KEY (event_id, user_id),
                FOREIGN KEY (event_id) REFERENCES events(id) ON DELETE CASCADE
            );
        "#,
    },
];

/// Initialize the migrations table
fn init_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version
pub(crate) fn current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> =
        conn.query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Run all pending migrations, each in its own transaction
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    init_migrations_table(conn)?;

    let from = current_version(conn)?;
    info!(current_version = from, "Checking for pending migrations");

    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        info!(
            version = migration.version,
            description = migration.description,
            "Applying migration"
        );

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        tx.commit()?;
    }

    let to = current_version(conn)?;
    if to > from {
        info!(from, to, "Database schema updated");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latest_version() -> u32 {
        MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
    }

    #[test]
    fn test_migrations_run() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_migrations_sequential() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(
                migration.version as usize,
                i + 1,
                "Migration {} should have version {}",
                migration.description,
                i + 1
            );
        }
    }

    #[test]
    fn test_dependent_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        for table in [
            "events",
            "event_participants",
            "event_responses",
            "event_messages",
            "visitor_acknowledgements",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }
}
