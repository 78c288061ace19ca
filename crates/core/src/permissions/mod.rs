//! Permission system for event operations

use uuid::Uuid;

use crate::models::Event;

/// A user's relationship to one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventRole {
    /// Created the event; never implied to be a participant
    Host = 3,
    /// Currently in `participants`
    Participant = 2,
    /// Everyone else
    Outsider = 1,
}

impl EventRole {
    /// Role of `user_id` in `event`. The host outranks a participant entry.
    pub fn of(event: &Event, user_id: Uuid) -> Self {
        if event.is_host(user_id) {
            EventRole::Host
        } else if event.is_participant(user_id) {
            EventRole::Participant
        } else {
            EventRole::Outsider
        }
    }
}

/// Actions that can be performed on an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    // Event management
    DeleteEvent,

    // Registration
    ViewResponses,

    // Chat
    ReadChat,
    PostMessage,
}

/// Permission matrix for event roles
pub struct PermissionMatrix;

impl PermissionMatrix {
    /// Check if a role has permission to perform an action
    pub fn can_perform(role: EventRole, action: EventAction) -> bool {
        match action {
            // Host only
            EventAction::DeleteEvent => role == EventRole::Host,
            EventAction::ViewResponses => role == EventRole::Host,

            // Chat is for the people running or attending the event
            EventAction::ReadChat => role >= EventRole::Participant,
            EventAction::PostMessage => role >= EventRole::Participant,
        }
    }

    /// Shorthand for checking `user_id` directly against an event
    pub fn allows(event: &Event, user_id: Uuid, action: EventAction) -> bool {
        Self::can_perform(EventRole::of(event, user_id), action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DormId, EventDraft, Viewer};
    use chrono::Utc;

    #[test]
    fn test_host_permissions() {
        assert!(PermissionMatrix::can_perform(EventRole::Host, EventAction::DeleteEvent));
        assert!(PermissionMatrix::can_perform(EventRole::Host, EventAction::ViewResponses));
        assert!(PermissionMatrix::can_perform(EventRole::Host, EventAction::PostMessage));
    }

    #[test]
    fn test_participant_permissions() {
        assert!(PermissionMatrix::can_perform(EventRole::Participant, EventAction::PostMessage));
        assert!(!PermissionMatrix::can_perform(EventRole::Participant, EventAction::ViewResponses));
        assert!(!PermissionMatrix::can_perform(EventRole::Participant, EventAction::DeleteEvent));
    }

    #[test]
    fn test_outsider_permissions() {
        assert!(!PermissionMatrix::can_perform(EventRole::Outsider, EventAction::ReadChat));
        assert!(!PermissionMatrix::can_perform(EventRole::Outsider, EventAction::PostMessage));
    }

    #[test]
    fn test_role_of() {
        let host = Viewer::new(Uuid::new_v4(), "KTU");
        let mut event = Event::create(
            &host,
            EventDraft::new("Board games".into(), DormId::from("KTU"), Utc::now(), 5),
        )
        .unwrap();
        let member = Uuid::new_v4();
        event.participants.push(member);
        // Host who also joined is still treated as host
        event.participants.push(host.id);

        assert_eq!(EventRole::of(&event, host.id), EventRole::Host);
        assert_eq!(EventRole::of(&event, member), EventRole::Participant);
        assert_eq!(EventRole::of(&event, Uuid::new_v4()), EventRole::Outsider);
    }
}
