//! Dorm identifiers, profiles and the per-call viewer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of a residential community
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DormId(pub String);

impl DormId {
    /// Community-wide scope; residency rules never apply here
    pub const GENERAL: &'static str = "General";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn general() -> Self {
        Self(Self::GENERAL.to_string())
    }

    pub fn is_general(&self) -> bool {
        self.0 == Self::GENERAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DormId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DormId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The authenticated user an evaluation is performed for.
///
/// Always passed explicitly; nothing in this crate reads a current-user global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: Uuid,
    pub home_dorm: DormId,
}

impl Viewer {
    pub fn new(id: Uuid, home_dorm: impl Into<DormId>) -> Self {
        Self {
            id,
            home_dorm: home_dorm.into(),
        }
    }
}

impl From<&Profile> for Viewer {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.user_id,
            home_dorm: profile.home_dorm.clone(),
        }
    }
}

/// Social profile of a resident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: Uuid,
    pub display_name: String,
    pub photo_url: Option<String>,
    pub home_dorm: DormId,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: Uuid, display_name: String, home_dorm: DormId) -> Self {
        Self {
            user_id,
            display_name,
            photo_url: None,
            home_dorm,
            created_at: Utc::now(),
        }
    }

    pub fn with_photo(mut self, url: String) -> Self {
        self.photo_url = Some(url);
        self
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            user_id: self.user_id,
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

/// The public part of a profile shown next to a participant or message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub user_id: Uuid,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl ProfileSummary {
    /// Stand-in for a user whose profile could not be loaded
    pub fn unknown(user_id: Uuid) -> Self {
        Self {
            user_id,
            display_name: "Unknown resident".to_string(),
            photo_url: None,
        }
    }
}
