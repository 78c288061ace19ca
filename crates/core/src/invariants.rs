//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use uuid::Uuid;

use crate::models::Event;

/// Validate that an event snapshot is internally consistent
pub fn assert_event_invariants(event: &Event) {
    debug_assert!(event.capacity > 0, "Event {} has zero capacity", event.id);

    debug_assert!(
        event.participants.len() <= event.capacity as usize,
        "Event {} has {} participants over capacity {}",
        event.id,
        event.participants.len(),
        event.capacity
    );

    let unique: HashSet<&Uuid> = event.participants.iter().collect();
    debug_assert!(
        unique.len() == event.participants.len(),
        "Event {} lists a participant twice",
        event.id
    );

    debug_assert!(
        event
            .anonymous_participants
            .iter()
            .all(|id| unique.contains(id)),
        "Event {} has anonymous participants outside participants",
        event.id
    );

    debug_assert!(
        event.responses.keys().all(|id| unique.contains(id)),
        "Event {} has responses from non-participants",
        event.id
    );
}

/// Validate that a user ID is not nil
pub fn assert_user_id_valid(user_id: Uuid, context: &str) {
    debug_assert!(
        user_id != Uuid::nil(),
        "Nil user_id in context: {}",
        context
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DormId, EventDraft, FormResponses, Viewer};
    use chrono::Utc;

    fn make_event(capacity: u32) -> Event {
        let host = Viewer::new(Uuid::new_v4(), "KTU");
        Event::create(
            &host,
            EventDraft::new("Test Event".into(), DormId::from("KTU"), Utc::now(), capacity),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_event() {
        let mut event = make_event(2);
        let member = Uuid::new_v4();
        event.participants.push(member);
        event.anonymous_participants.insert(member);
        event.responses.insert(member, FormResponses::new());
        assert_event_invariants(&event);
    }

    #[test]
    #[should_panic(expected = "over capacity")]
    fn test_over_capacity() {
        let mut event = make_event(1);
        event.participants.extend([Uuid::new_v4(), Uuid::new_v4()]);
        assert_event_invariants(&event);
    }

    #[test]
    #[should_panic(expected = "anonymous participants outside")]
    fn test_anonymous_not_subset() {
        let mut event = make_event(2);
        event.anonymous_participants.insert(Uuid::new_v4());
        assert_event_invariants(&event);
    }

    #[test]
    #[should_panic(expected = "responses from non-participants")]
    fn test_orphan_responses() {
        let mut event = make_event(2);
        event.responses.insert(Uuid::new_v4(), FormResponses::new());
        assert_event_invariants(&event);
    }

    #[test]
    #[should_panic(expected = "Nil user_id")]
    fn test_nil_user() {
        assert_user_id_valid(Uuid::nil(), "test");
    }
}
