//! Event model - the unit residents join and leave

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DormId, FormResponses, RegistrationField, Viewer};
use crate::error::{Error, Result};
use crate::invariants::assert_user_id_valid;

/// Host-supplied fields for a new event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub owner_dorm: DormId,
    pub residents_only: bool,
    /// Inter-institution exchange event, open to visitors without disclosure
    pub is_esn: bool,
    pub capacity: u32,
    pub desired_count: Option<u32>,
    pub registration_fields: Vec<RegistrationField>,
    pub image_url: Option<String>,
}

impl EventDraft {
    pub fn new(title: String, owner_dorm: DormId, starts_at: DateTime<Utc>, capacity: u32) -> Self {
        Self {
            title,
            description: None,
            location: None,
            starts_at,
            owner_dorm,
            residents_only: false,
            is_esn: false,
            capacity,
            desired_count: None,
            registration_fields: Vec::new(),
            image_url: None,
        }
    }

    pub fn residents_only(mut self) -> Self {
        self.residents_only = true;
        self
    }

    pub fn esn(mut self) -> Self {
        self.is_esn = true;
        self
    }

    pub fn with_fields(mut self, fields: Vec<RegistrationField>) -> Self {
        self.registration_fields = fields;
        self
    }

    pub fn with_description(mut self, description: String) -> Self {
        self.description = Some(description);
        self
    }
}

/// A dorm or community event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub image_url: Option<String>,
    pub owner_dorm: DormId,
    pub host_id: Uuid,
    /// Fixed at creation from the host's home dorm
    pub is_host_resident: bool,
    pub residents_only: bool,
    pub is_esn: bool,
    pub capacity: u32,
    /// Informational target size; never gates joining
    pub desired_count: Option<u32>,
    /// Join order, which is also display order
    pub participants: Vec<Uuid>,
    pub anonymous_participants: BTreeSet<Uuid>,
    pub registration_fields: Vec<RegistrationField>,
    pub responses: BTreeMap<Uuid, FormResponses>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Build a new event hosted by `host`. The host is not auto-joined.
    pub fn create(host: &Viewer, draft: EventDraft) -> Result<Self> {
        assert_user_id_valid(host.id, "Event::create host");
        if draft.capacity == 0 {
            return Err(Error::InvalidOperation(
                "Event capacity must be at least 1".into(),
            ));
        }
        if draft.title.trim().is_empty() {
            return Err(Error::InvalidOperation("Event title must not be empty".into()));
        }

        let mut seen = BTreeSet::new();
        for field in &draft.registration_fields {
            if !seen.insert(field.id.as_str()) {
                return Err(Error::InvalidOperation(format!(
                    "Duplicate registration field id '{}'",
                    field.id
                )));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            location: draft.location,
            starts_at: draft.starts_at,
            image_url: draft.image_url,
            is_host_resident: host.home_dorm == draft.owner_dorm,
            owner_dorm: draft.owner_dorm,
            host_id: host.id,
            residents_only: draft.residents_only,
            is_esn: draft.is_esn,
            capacity: draft.capacity,
            desired_count: draft.desired_count,
            participants: Vec::new(),
            anonymous_participants: BTreeSet::new(),
            registration_fields: draft.registration_fields,
            responses: BTreeMap::new(),
            created_at: Utc::now(),
        })
    }

    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    pub fn is_host(&self, user_id: Uuid) -> bool {
        self.host_id == user_id
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.capacity as usize
    }

    pub fn remaining_places(&self) -> u32 {
        self.capacity.saturating_sub(self.participants.len() as u32)
    }

    pub fn has_registration(&self) -> bool {
        !self.registration_fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(capacity: u32) -> EventDraft {
        EventDraft::new("Movie night".into(), DormId::from("KTU"), Utc::now(), capacity)
    }

    #[test]
    fn test_host_residency_fixed_at_creation() {
        let resident = Viewer::new(Uuid::new_v4(), "KTU");
        let visitor = Viewer::new(Uuid::new_v4(), "LSMU");

        assert!(Event::create(&resident, draft(4)).unwrap().is_host_resident);
        assert!(!Event::create(&visitor, draft(4)).unwrap().is_host_resident);
    }

    #[test]
    fn test_host_not_auto_joined() {
        let host = Viewer::new(Uuid::new_v4(), "KTU");
        let event = Event::create(&host, draft(4)).unwrap();
        assert!(event.participants.is_empty());
        assert!(!event.is_participant(host.id));
        assert_eq!(event.remaining_places(), 4);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let host = Viewer::new(Uuid::new_v4(), "KTU");
        assert!(matches!(
            Event::create(&host, draft(0)),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_duplicate_field_ids_rejected() {
        use crate::models::FieldKind;

        let host = Viewer::new(Uuid::new_v4(), "KTU");
        let fields = vec![
            RegistrationField::new("f1", "Name", FieldKind::Text),
            RegistrationField::new("f1", "Again", FieldKind::LongText),
        ];
        assert!(Event::create(&host, draft(3).with_fields(fields)).is_err());
    }
}
