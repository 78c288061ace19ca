//! Dormhub Core Library
//!
//! Event participation for student dormitories: who may join an event, how a
//! join or leave is committed without overfilling it, and which participant
//! identities each viewer may see.

pub mod config;
pub mod error;
pub mod feed;
pub mod invariants;
pub mod models;
pub mod notify;
pub mod participation;
pub mod permissions;
pub mod service;
pub mod storage;

pub use config::{ConfigError, DormConfig};
pub use error::{Error, Result};
pub use feed::{EventSnapshot, SnapshotFeed};
pub use models::*;
pub use notify::{
    ChannelDispatcher, Notification, NotificationDispatcher, NotificationTarget, NullDispatcher,
};
pub use participation::*;
pub use permissions::*;
pub use service::{JoinPreview, ParticipationService, ToggleOutcome};
pub use storage::{
    ChatRepository, Database, EventRepository, NotificationPreferences, PatchOutcome,
    ProfileRepository, ResidentRepository, Storage,
};
