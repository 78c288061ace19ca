//! Join/leave toggle and the patches it produces

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::eligibility::{can_join, Decision, RejectReason};
use crate::invariants::assert_user_id_valid;
use crate::models::{Event, FormResponses, Viewer};

/// Caller-supplied choices for a join attempt
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinOptions {
    /// Hide the joiner's identity from other participants
    pub anonymous: bool,
    /// Answers to the event's registration form, once collected
    pub form_responses: Option<FormResponses>,
    /// The viewer accepted the visitor rules for a cross-dorm event
    pub visitor_rules_acknowledged: bool,
}

impl JoinOptions {
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Self::default()
        }
    }

    pub fn with_responses(mut self, responses: FormResponses) -> Self {
        self.form_responses = Some(responses);
        self
    }

    pub fn acknowledging_visitor_rules(mut self) -> Self {
        self.visitor_rules_acknowledged = true;
        self
    }
}

/// Recoverable outcomes of a join attempt. Returned as values so the
/// presentation layer decides how to show them.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum JoinError {
    #[error("{0}")]
    Rejected(RejectReason),

    #[error("Registration form must be completed before joining")]
    NeedsRegistration,

    #[error("Required field '{field_id}' is missing an answer")]
    Validation { field_id: String },

    #[error("Visitor rules must be acknowledged before joining another dorm's event")]
    VisitorRulesUnacknowledged,

    #[error("Someone else changed this event first; reload and try again")]
    WriteConflict,
}

impl From<RejectReason> for JoinError {
    fn from(reason: RejectReason) -> Self {
        JoinError::Rejected(reason)
    }
}

/// The membership change a patch carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MembershipChange {
    Join {
        user_id: Uuid,
        anonymous: bool,
        responses: Option<FormResponses>,
    },
    Leave {
        user_id: Uuid,
    },
}

/// A membership update to submit through the store's conditional write path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    pub event_id: Uuid,
    pub change: MembershipChange,
}

impl EventPatch {
    pub fn join(event_id: Uuid, user_id: Uuid, anonymous: bool, responses: Option<FormResponses>) -> Self {
        Self {
            event_id,
            change: MembershipChange::Join {
                user_id,
                anonymous,
                responses,
            },
        }
    }

    pub fn leave(event_id: Uuid, user_id: Uuid) -> Self {
        Self {
            event_id,
            change: MembershipChange::Leave { user_id },
        }
    }

    pub fn user_id(&self) -> Uuid {
        match &self.change {
            MembershipChange::Join { user_id, .. } | MembershipChange::Leave { user_id } => *user_id,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self.change, MembershipChange::Join { .. })
    }

    /// Apply the patch to a local snapshot, e.g. for an optimistic render.
    ///
    /// Returns false and leaves `event` untouched when the patch would not be
    /// accepted by the store (capacity reached, already joined).
    pub fn apply_to(&self, event: &mut Event) -> bool {
        match &self.change {
            MembershipChange::Join {
                user_id,
                anonymous,
                responses,
            } => {
                if event.is_participant(*user_id) || event.is_full() {
                    return false;
                }
                event.participants.push(*user_id);
                if *anonymous {
                    event.anonymous_participants.insert(*user_id);
                }
                if let Some(responses) = responses {
                    event.responses.insert(*user_id, responses.clone());
                }
                true
            }
            MembershipChange::Leave { user_id } => {
                event.participants.retain(|p| p != user_id);
                event.anonymous_participants.remove(user_id);
                event.responses.remove(user_id);
                true
            }
        }
    }
}

/// Produce the membership patch for `viewer` pressing join/leave on `event`.
///
/// Members always get a leave patch. Non-members are checked with
/// [`can_join`], then against the registration form. Answers to ids the form
/// does not declare are dropped.
pub fn toggle_membership(
    event: &Event,
    viewer: &Viewer,
    options: &JoinOptions,
) -> Result<EventPatch, JoinError> {
    assert_user_id_valid(viewer.id, "toggle_membership viewer");

    if event.is_participant(viewer.id) {
        return Ok(EventPatch::leave(event.id, viewer.id));
    }

    if let Decision::Rejected(reason) = can_join(event, viewer) {
        return Err(reason.into());
    }

    let responses = if event.has_registration() {
        let supplied = options
            .form_responses
            .as_ref()
            .ok_or(JoinError::NeedsRegistration)?;

        if let Some(missing) = event
            .registration_fields
            .iter()
            .find(|f| f.required && !f.is_answered(supplied))
        {
            return Err(JoinError::Validation {
                field_id: missing.id.clone(),
            });
        }

        let answers: FormResponses = event
            .registration_fields
            .iter()
            .filter_map(|f| supplied.get(&f.id).map(|a| (f.id.clone(), a.clone())))
            .collect();
        Some(answers)
    } else {
        None
    };

    Ok(EventPatch::join(event.id, viewer.id, options.anonymous, responses))
}
