//! Profile storage operations

use rusqlite::{params, Connection, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{parse_datetime, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::models::{DormId, Profile, Viewer};

pub struct ProfileStore<'a> {
    conn: &'a Connection,
}

impl<'a> ProfileStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert or replace a profile
    #[instrument(skip(self, profile), fields(user_id = %profile.user_id))]
    pub fn upsert(&self, profile: &Profile) -> Result<()> {
        self.conn.execute(
            "INSERT INTO profiles (user_id, display_name, photo_url, home_dorm, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                display_name = excluded.display_name,
                photo_url = excluded.photo_url,
                home_dorm = excluded.home_dorm",
            params![
                profile.user_id.to_string(),
                profile.display_name,
                profile.photo_url,
                profile.home_dorm.as_str(),
                profile.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Find profile by user ID
    #[instrument(skip(self))]
    pub fn find_by_id(&self, user_id: Uuid) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT user_id, display_name, photo_url, home_dorm, created_at
                 FROM profiles WHERE user_id = ?1",
                params![user_id.to_string()],
                profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    /// Resolve the viewer attributes for a signed-in user
    pub fn viewer_for(&self, user_id: Uuid) -> Result<Option<Viewer>> {
        Ok(self.find_by_id(user_id)?.as_ref().map(Viewer::from))
    }

    /// Residents whose home dorm is `dorm`, by name
    #[instrument(skip(self))]
    pub fn list_residents(&self, dorm: &DormId) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, display_name, photo_url, home_dorm, created_at
             FROM profiles WHERE home_dorm = ?1 ORDER BY display_name",
        )?;
        let profiles = stmt
            .query_map(params![dorm.as_str()], profile_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(profiles)
    }
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: parse_uuid(&row.get::<_, String>(0)?)?,
        display_name: row.get(1)?,
        photo_url: row.get(2)?,
        home_dorm: DormId(row.get(3)?),
        created_at: parse_datetime(&row.get::<_, String>(4)?)?,
    })
}
