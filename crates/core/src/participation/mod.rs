//! Event participation rules
//!
//! Pure functions of `(event, viewer)`: who may join, what a join/leave
//! changes, and whose identity a viewer may see. They hold no state; callers
//! re-run them on every new event snapshot.

mod eligibility;
mod toggle;
mod visibility;

pub use eligibility::{can_join, cross_dorm_notice_required, Decision, RejectReason};
pub use toggle::{toggle_membership, EventPatch, JoinError, JoinOptions, MembershipChange};
pub use visibility::{
    can_view_responses, render_participants, resolve_sender_visibility, resolve_visibility,
    response_sheets, ParticipantIdentity, ParticipantView, ResponseEntry, ResponseSheet,
    Visibility,
};
