//! Participant identity masking and registration response access

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ChatMessage, Event, ProfileSummary, Viewer};
use crate::permissions::{EventAction, PermissionMatrix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Revealed,
    Masked,
}

/// What `viewer` may learn about `participant_id`.
///
/// Anonymous participants are masked from everyone except the host and
/// themselves.
pub fn resolve_visibility(event: &Event, participant_id: Uuid, viewer: &Viewer) -> Visibility {
    let masked = event.anonymous_participants.contains(&participant_id)
        && viewer.id != event.host_id
        && viewer.id != participant_id;

    if masked {
        Visibility::Masked
    } else {
        Visibility::Revealed
    }
}

/// What `viewer` may learn about the sender of `message`.
///
/// Decided by the anonymity the sender had when posting, so leaving the
/// event later does not unmask old messages.
pub fn resolve_sender_visibility(event: &Event, message: &ChatMessage, viewer: &Viewer) -> Visibility {
    if message.is_anonymous && viewer.id != event.host_id && viewer.id != message.sender_id {
        Visibility::Masked
    } else {
        Visibility::Revealed
    }
}

/// Only the host may read registration responses.
pub fn can_view_responses(event: &Event, viewer: &Viewer) -> bool {
    PermissionMatrix::allows(event, viewer.id, EventAction::ViewResponses)
}

/// Identity shown in one row of a participant list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticipantIdentity {
    Revealed(ProfileSummary),
    /// Generic placeholder: no id, no name, no photo
    Masked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub identity: ParticipantIdentity,
    /// Set for the viewer's own row
    pub is_self: bool,
    /// Anonymity flag, only disclosed on rows the viewer may see through
    pub joined_anonymously: bool,
}

impl ParticipantView {
    pub fn display_name<'a>(&'a self, placeholder: &'a str) -> &'a str {
        match &self.identity {
            ParticipantIdentity::Revealed(profile) => &profile.display_name,
            ParticipantIdentity::Masked => placeholder,
        }
    }
}

/// Render the participant list of `event` for `viewer`, in join order.
///
/// `lookup` resolves profiles; it is never consulted for masked rows.
pub fn render_participants<F>(event: &Event, viewer: &Viewer, mut lookup: F) -> Vec<ParticipantView>
where
    F: FnMut(Uuid) -> Option<ProfileSummary>,
{
    event
        .participants
        .iter()
        .map(|&participant_id| match resolve_visibility(event, participant_id, viewer) {
            Visibility::Masked => ParticipantView {
                identity: ParticipantIdentity::Masked,
                is_self: false,
                joined_anonymously: false,
            },
            Visibility::Revealed => ParticipantView {
                identity: ParticipantIdentity::Revealed(
                    lookup(participant_id)
                        .unwrap_or_else(|| ProfileSummary::unknown(participant_id)),
                ),
                is_self: participant_id == viewer.id,
                joined_anonymously: event.anonymous_participants.contains(&participant_id),
            },
        })
        .collect()
}

/// One answered (or unanswered) question in a participant's registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub field_id: String,
    pub label: String,
    pub answer: Option<String>,
}

/// A participant's registration answers in form order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSheet {
    pub participant_id: Uuid,
    pub entries: Vec<ResponseEntry>,
}

/// Registration answers for the host's review, or `None` for anyone else.
pub fn response_sheets(event: &Event, viewer: &Viewer) -> Option<Vec<ResponseSheet>> {
    if !can_view_responses(event, viewer) {
        return None;
    }

    let sheets = event
        .participants
        .iter()
        .filter_map(|participant_id| {
            let answers = event.responses.get(participant_id)?;
            let entries = event
                .registration_fields
                .iter()
                .map(|field| ResponseEntry {
                    field_id: field.id.clone(),
                    label: field.label.clone(),
                    answer: answers.get(&field.id).cloned(),
                })
                .collect();
            Some(ResponseSheet {
                participant_id: *participant_id,
                entries,
            })
        })
        .collect();

    Some(sheets)
}
