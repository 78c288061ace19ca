//! Data models for Dormhub

mod dorm;
mod event;
mod message;
mod registration;

pub use dorm::*;
pub use event::*;
pub use message::*;
pub use registration::*;
