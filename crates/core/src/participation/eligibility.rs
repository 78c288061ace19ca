//! Join eligibility and the cross-dorm visitor disclosure

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Event, Viewer};

/// Why a join attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
pub enum RejectReason {
    #[error("This event is already full")]
    AlreadyFull,
    #[error("This event is open to residents of its dorm only")]
    ResidentsOnly,
}

/// Outcome of [`can_join`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allowed,
    Rejected(RejectReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Decide whether `viewer` may join `event` right now.
///
/// The residency gate is evaluated before capacity, so an ineligible viewer is
/// told about the dorm restriction whether or not places remain. Current
/// membership is not considered here; a member's toggle is a leave.
pub fn can_join(event: &Event, viewer: &Viewer) -> Decision {
    if event.residents_only
        && !event.owner_dorm.is_general()
        && viewer.home_dorm != event.owner_dorm
    {
        return Decision::Rejected(RejectReason::ResidentsOnly);
    }

    if event.is_full() {
        return Decision::Rejected(RejectReason::AlreadyFull);
    }

    Decision::Allowed
}

/// Whether the viewer must accept the visitor rules before a join commits.
pub fn cross_dorm_notice_required(event: &Event, viewer: &Viewer) -> bool {
    viewer.home_dorm != event.owner_dorm
        && !event.residents_only
        && !event.owner_dorm.is_general()
        && !event.is_esn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DormId, EventDraft};
    use chrono::Utc;
    use uuid::Uuid;

    fn event_in(dorm: &str, capacity: u32) -> Event {
        let host = Viewer::new(Uuid::new_v4(), dorm);
        Event::create(
            &host,
            EventDraft::new("Karaoke".into(), DormId::from(dorm), Utc::now(), capacity),
        )
        .unwrap()
    }

    fn fill(event: &mut Event) {
        while !event.is_full() {
            event.participants.push(Uuid::new_v4());
        }
    }

    #[test]
    fn test_residents_only_gate() {
        let mut event = event_in("KTU", 3);
        event.residents_only = true;

        let outsider = Viewer::new(Uuid::new_v4(), "LSMU");
        let resident = Viewer::new(Uuid::new_v4(), "KTU");

        assert_eq!(
            can_join(&event, &outsider),
            Decision::Rejected(RejectReason::ResidentsOnly)
        );
        assert_eq!(can_join(&event, &resident), Decision::Allowed);

        // Capacity does not change which viewers the residency rule rejects
        fill(&mut event);
        assert_eq!(
            can_join(&event, &outsider),
            Decision::Rejected(RejectReason::ResidentsOnly)
        );
        assert_eq!(
            can_join(&event, &resident),
            Decision::Rejected(RejectReason::AlreadyFull)
        );
    }

    #[test]
    fn test_residents_only_ignored_for_general() {
        let mut event = event_in(DormId::GENERAL, 3);
        event.residents_only = true;

        let anyone = Viewer::new(Uuid::new_v4(), "VU");
        assert_eq!(can_join(&event, &anyone), Decision::Allowed);
    }

    #[test]
    fn test_full_event_rejects() {
        let mut event = event_in("KTU", 1);
        fill(&mut event);

        let viewer = Viewer::new(Uuid::new_v4(), "KTU");
        assert_eq!(
            can_join(&event, &viewer),
            Decision::Rejected(RejectReason::AlreadyFull)
        );
    }

    #[test]
    fn test_desired_count_does_not_gate() {
        let mut event = event_in("KTU", 5);
        event.desired_count = Some(1);
        event.participants.push(Uuid::new_v4());

        let viewer = Viewer::new(Uuid::new_v4(), "KTU");
        assert!(can_join(&event, &viewer).is_allowed());
    }

    #[test]
    fn test_cross_dorm_notice() {
        let event = event_in("KTU", 5);
        let visitor = Viewer::new(Uuid::new_v4(), "LSMU");
        let resident = Viewer::new(Uuid::new_v4(), "KTU");

        assert!(cross_dorm_notice_required(&event, &visitor));
        assert!(!cross_dorm_notice_required(&event, &resident));
    }

    #[test]
    fn test_cross_dorm_notice_exemptions() {
        let visitor = Viewer::new(Uuid::new_v4(), "LSMU");

        let mut residents_only = event_in("KTU", 5);
        residents_only.residents_only = true;
        assert!(!cross_dorm_notice_required(&residents_only, &visitor));

        let general = event_in(DormId::GENERAL, 5);
        assert!(!cross_dorm_notice_required(&general, &visitor));

        let mut esn = event_in("KTU", 5);
        esn.is_esn = true;
        assert!(!cross_dorm_notice_required(&esn, &visitor));
    }
}
