//! Event storage operations
//!
//! Membership changes go through [`EventStore::apply_patch`], whose join path
//! is a single conditional insert: the capacity and not-yet-joined checks run
//! inside the write, so racing writers cannot overfill an event.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::parse::{parse_datetime, parse_json, parse_uuid, OptionalExt};
use crate::error::Result;
use crate::invariants::assert_event_invariants;
use crate::models::{DormId, Event, FormResponses};
use crate::participation::{EventPatch, MembershipChange};

/// Result of submitting a patch through the conditional write path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    /// The precondition no longer held at write time; nothing was written
    Conflict,
}

const EVENT_COLUMNS: &str = "id, title, description, location, starts_at, image_url, owner_dorm, host_id,
     is_host_resident, residents_only, is_esn, capacity, desired_count, registration_fields, created_at";

pub struct EventStore<'a> {
    conn: &'a Connection,
}

impl<'a> EventStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create a new event together with any initial membership it carries
    #[instrument(skip(self, event), fields(event_id = %event.id, owner_dorm = %event.owner_dorm))]
    pub fn create(&self, event: &Event) -> Result<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO events (id, title, description, location, starts_at, image_url, owner_dorm, host_id,
                                 is_host_resident, residents_only, is_esn, capacity, desired_count,
                                 registration_fields, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                event.id.to_string(),
                event.title,
                event.description,
                event.location,
                event.starts_at.to_rfc3339(),
                event.image_url,
                event.owner_dorm.as_str(),
                event.host_id.to_string(),
                event.is_host_resident as i32,
                event.residents_only as i32,
                event.is_esn as i32,
                event.capacity,
                event.desired_count,
                serde_json::to_string(&event.registration_fields)?,
                event.created_at.to_rfc3339(),
            ],
        )?;

        for user_id in &event.participants {
            tx.execute(
                "INSERT INTO event_participants (event_id, user_id, is_anonymous, joined_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    event.id.to_string(),
                    user_id.to_string(),
                    event.anonymous_participants.contains(user_id) as i32,
                    Utc::now().to_rfc3339(),
                ],
            )?;
        }
        for (user_id, answers) in &event.responses {
            insert_responses(&tx, event.id, *user_id, answers)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Point read of a full event snapshot
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1");
        let event = self
            .conn
            .query_row(&sql, params![id.to_string()], event_from_row)
            .optional()?;

        match event {
            Some(mut event) => {
                self.load_membership(&mut event)?;
                Ok(Some(event))
            }
            None => Ok(None),
        }
    }

    /// Events owned by `dorm` plus community-wide events, soonest first
    #[instrument(skip(self))]
    pub fn list_for_dorm(&self, dorm: &DormId) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE owner_dorm = ?1 OR owner_dorm = ?2
             ORDER BY starts_at, created_at"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![dorm.as_str(), DormId::GENERAL], event_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.with_membership(events)
    }

    /// Events `user_id` has joined, soonest first
    #[instrument(skip(self))]
    pub fn list_joined_by(&self, user_id: Uuid) -> Result<Vec<Event>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE id IN (SELECT event_id FROM event_participants WHERE user_id = ?1)
             ORDER BY starts_at, created_at"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![user_id.to_string()], event_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.with_membership(events)
    }

    /// Delete an event; participants, responses, chat and acknowledgements
    /// cascade. Returns whether a row was removed.
    #[instrument(skip(self))]
    pub fn delete(&self, event_id: Uuid) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM events WHERE id = ?1", params![event_id.to_string()])?;
        Ok(removed > 0)
    }

    /// Submit a membership patch atomically.
    ///
    /// A join is only written if the event exists, has a free place and does
    /// not already list the user. A leave always succeeds; leaving when not a
    /// member changes nothing.
    #[instrument(skip(self, patch), fields(event_id = %patch.event_id, user_id = %patch.user_id()))]
    pub fn apply_patch(&self, patch: &EventPatch) -> Result<PatchOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let event_id = patch.event_id.to_string();

        let outcome = match &patch.change {
            MembershipChange::Join {
                user_id,
                anonymous,
                responses,
            } => {
                let inserted = tx.execute(
                    "INSERT INTO event_participants (event_id, user_id, is_anonymous, joined_at)
                     SELECT e.id, ?2, ?3, ?4 FROM events e
                     WHERE e.id = ?1
                       AND (SELECT COUNT(*) FROM event_participants p WHERE p.event_id = e.id) < e.capacity
                       AND NOT EXISTS (
                           SELECT 1 FROM event_participants p WHERE p.event_id = e.id AND p.user_id = ?2
                       )",
                    params![
                        event_id,
                        user_id.to_string(),
                        *anonymous as i32,
                        Utc::now().to_rfc3339(),
                    ],
                )?;

                if inserted == 0 {
                    debug!("Join precondition failed");
                    PatchOutcome::Conflict
                } else {
                    if let Some(answers) = responses {
                        insert_responses(&tx, patch.event_id, *user_id, answers)?;
                    }
                    PatchOutcome::Applied
                }
            }
            MembershipChange::Leave { user_id } => {
                let removed = tx.execute(
                    "DELETE FROM event_participants WHERE event_id = ?1 AND user_id = ?2",
                    params![event_id, user_id.to_string()],
                )?;
                tx.execute(
                    "DELETE FROM event_responses WHERE event_id = ?1 AND user_id = ?2",
                    params![event_id, user_id.to_string()],
                )?;
                if removed == 0 {
                    debug!("Leave for non-member, nothing to remove");
                }
                PatchOutcome::Applied
            }
        };

        match outcome {
            PatchOutcome::Applied => tx.commit()?,
            PatchOutcome::Conflict => tx.rollback()?,
        }
        Ok(outcome)
    }

    /// Number of participants currently stored for an event
    pub fn participant_count(&self, event_id: Uuid) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM event_participants WHERE event_id = ?1",
            params![event_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn with_membership(&self, mut events: Vec<Event>) -> Result<Vec<Event>> {
        for event in &mut events {
            self.load_membership(event)?;
        }
        Ok(events)
    }

    fn load_membership(&self, event: &mut Event) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, is_anonymous FROM event_participants
             WHERE event_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![event.id.to_string()], |row| {
                Ok((
                    parse_uuid(&row.get::<_, String>(0)?)?,
                    row.get::<_, i32>(1)? != 0,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut participants = Vec::with_capacity(rows.len());
        let mut anonymous = BTreeSet::new();
        for (user_id, is_anonymous) in rows {
            participants.push(user_id);
            if is_anonymous {
                anonymous.insert(user_id);
            }
        }

        let mut stmt = self
            .conn
            .prepare("SELECT user_id, answers FROM event_responses WHERE event_id = ?1")?;
        let responses = stmt
            .query_map(params![event.id.to_string()], |row| {
                Ok((
                    parse_uuid(&row.get::<_, String>(0)?)?,
                    parse_json::<FormResponses>(&row.get::<_, String>(1)?)?,
                ))
            })?
            .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

        event.participants = participants;
        event.anonymous_participants = anonymous;
        event.responses = responses;

        assert_event_invariants(event);
        Ok(())
    }
}

fn insert_responses(conn: &Connection, event_id: Uuid, user_id: Uuid, answers: &FormResponses) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO event_responses (event_id, user_id, answers, submitted_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            event_id.to_string(),
            user_id.to_string(),
            serde_json::to_string(answers)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Map an `EVENT_COLUMNS` row; membership fields are filled in separately
fn event_from_row(row: &Row<'_>) -> rusqlite::Result<Event> {
    Ok(Event {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        starts_at: parse_datetime(&row.get::<_, String>(4)?)?,
        image_url: row.get(5)?,
        owner_dorm: DormId(row.get(6)?),
        host_id: parse_uuid(&row.get::<_, String>(7)?)?,
        is_host_resident: row.get::<_, i32>(8)? != 0,
        residents_only: row.get::<_, i32>(9)? != 0,
        is_esn: row.get::<_, i32>(10)? != 0,
        capacity: row.get(11)?,
        desired_count: row.get(12)?,
        registration_fields: parse_json(&row.get::<_, String>(13)?)?,
        participants: Vec::new(),
        anonymous_participants: BTreeSet::new(),
        responses: BTreeMap::new(),
        created_at: parse_datetime(&row.get::<_, String>(14)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventDraft, FieldKind, RegistrationField, Viewer};
    use crate::participation::{toggle_membership, JoinOptions};
    use crate::storage::Database;

    fn make_event(dorm: &str, capacity: u32) -> Event {
        let host = Viewer::new(Uuid::new_v4(), dorm);
        Event::create(
            &host,
            EventDraft::new("Laundry party".into(), DormId::from(dorm), Utc::now(), capacity),
        )
        .unwrap()
    }

    #[test]
    fn test_create_and_find() {
        let db = Database::open_in_memory().unwrap();
        let event = make_event("KTU", 4).with_test_fields();
        db.events().create(&event).unwrap();

        let loaded = db.events().find_by_id(event.id).unwrap().unwrap();
        assert_eq!(loaded.title, event.title);
        assert_eq!(loaded.owner_dorm, event.owner_dorm);
        assert_eq!(loaded.registration_fields, event.registration_fields);
        assert_eq!(loaded.capacity, 4);
        assert!(db.events().find_by_id(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_join_preserves_order_and_flags() {
        let db = Database::open_in_memory().unwrap();
        let event = make_event("KTU", 5);
        db.events().create(&event).unwrap();

        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        for (user, anonymous) in [(a, false), (b, true), (c, false)] {
            let outcome = db
                .events()
                .apply_patch(&EventPatch::join(event.id, user, anonymous, None))
                .unwrap();
            assert_eq!(outcome, PatchOutcome::Applied);
        }

        let loaded = db.events().find_by_id(event.id).unwrap().unwrap();
        assert_eq!(loaded.participants, vec![a, b, c]);
        assert_eq!(loaded.anonymous_participants, BTreeSet::from([b]));
    }

    #[test]
    fn test_join_over_capacity_conflicts() {
        let db = Database::open_in_memory().unwrap();
        let event = make_event("KTU", 1);
        db.events().create(&event).unwrap();

        let first = EventPatch::join(event.id, Uuid::new_v4(), false, None);
        let second = EventPatch::join(event.id, Uuid::new_v4(), false, None);
        assert_eq!(db.events().apply_patch(&first).unwrap(), PatchOutcome::Applied);
        assert_eq!(db.events().apply_patch(&second).unwrap(), PatchOutcome::Conflict);
        assert_eq!(db.events().participant_count(event.id).unwrap(), 1);
    }

    #[test]
    fn test_duplicate_join_conflicts() {
        let db = Database::open_in_memory().unwrap();
        let event = make_event("KTU", 3);
        db.events().create(&event).unwrap();

        let patch = EventPatch::join(event.id, Uuid::new_v4(), false, None);
        assert_eq!(db.events().apply_patch(&patch).unwrap(), PatchOutcome::Applied);
        assert_eq!(db.events().apply_patch(&patch).unwrap(), PatchOutcome::Conflict);
    }

    #[test]
    fn test_join_missing_event_conflicts() {
        let db = Database::open_in_memory().unwrap();
        let patch = EventPatch::join(Uuid::new_v4(), Uuid::new_v4(), false, None);
        assert_eq!(db.events().apply_patch(&patch).unwrap(), PatchOutcome::Conflict);
    }

    #[test]
    fn test_leave_removes_membership_and_responses() {
        let db = Database::open_in_memory().unwrap();
        let event = make_event("KTU", 3).with_test_fields();
        db.events().create(&event).unwrap();

        let viewer = Viewer::new(Uuid::new_v4(), "KTU");
        let mut answers = FormResponses::new();
        answers.insert("room".into(), "B-214".into());
        let patch = toggle_membership(
            &event,
            &viewer,
            &JoinOptions::anonymous().with_responses(answers),
        )
        .unwrap();
        db.events().apply_patch(&patch).unwrap();

        let joined = db.events().find_by_id(event.id).unwrap().unwrap();
        assert_eq!(joined.responses[&viewer.id]["room"], "B-214");

        let leave = toggle_membership(&joined, &viewer, &JoinOptions::default()).unwrap();
        assert_eq!(db.events().apply_patch(&leave).unwrap(), PatchOutcome::Applied);

        let left = db.events().find_by_id(event.id).unwrap().unwrap();
        assert!(left.participants.is_empty());
        assert!(left.anonymous_participants.is_empty());
        assert!(left.responses.is_empty());
    }

    #[test]
    fn test_leave_non_member_is_noop() {
        let db = Database::open_in_memory().unwrap();
        let event = make_event("KTU", 3);
        db.events().create(&event).unwrap();
        let member = Uuid::new_v4();
        db.events()
            .apply_patch(&EventPatch::join(event.id, member, false, None))
            .unwrap();

        let outcome = db
            .events()
            .apply_patch(&EventPatch::leave(event.id, Uuid::new_v4()))
            .unwrap();
        assert_eq!(outcome, PatchOutcome::Applied);
        assert_eq!(
            db.events().find_by_id(event.id).unwrap().unwrap().participants,
            vec![member]
        );
    }

    #[test]
    fn test_list_for_dorm_includes_general() {
        let db = Database::open_in_memory().unwrap();
        let ktu = make_event("KTU", 3);
        let general = make_event(DormId::GENERAL, 3);
        let vu = make_event("VU", 3);
        for event in [&ktu, &general, &vu] {
            db.events().create(event).unwrap();
        }

        let ids: BTreeSet<Uuid> = db
            .events()
            .list_for_dorm(&DormId::from("KTU"))
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, BTreeSet::from([ktu.id, general.id]));
    }

    #[test]
    fn test_list_joined_by() {
        let db = Database::open_in_memory().unwrap();
        let joined = make_event("KTU", 3);
        let other = make_event("KTU", 3);
        db.events().create(&joined).unwrap();
        db.events().create(&other).unwrap();

        let user = Uuid::new_v4();
        db.events()
            .apply_patch(&EventPatch::join(joined.id, user, false, None))
            .unwrap();

        let events = db.events().list_joined_by(user).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, joined.id);
    }

    #[test]
    fn test_delete_cascades() {
        let db = Database::open_in_memory().unwrap();
        let event = make_event("KTU", 3).with_test_fields();
        db.events().create(&event).unwrap();

        let mut answers = FormResponses::new();
        answers.insert("room".into(), "A-1".into());
        db.events()
            .apply_patch(&EventPatch::join(event.id, Uuid::new_v4(), false, Some(answers)))
            .unwrap();

        assert!(db.events().delete(event.id).unwrap());
        assert!(!db.events().delete(event.id).unwrap());
        assert!(db.events().find_by_id(event.id).unwrap().is_none());
        assert_eq!(db.events().participant_count(event.id).unwrap(), 0);
    }

    impl Event {
        fn with_test_fields(mut self) -> Self {
            self.registration_fields = vec![
                RegistrationField::new("room", "Room number", FieldKind::Text).required(),
                RegistrationField::new("rules", "I follow the house rules", FieldKind::Consent),
            ];
            self
        }
    }
}
