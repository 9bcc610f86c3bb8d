use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoachStatus {
    Active,
    Inactive,
}

impl CoachStatus {
    pub fn toggled(self) -> Self {
        match self {
            CoachStatus::Active => CoachStatus::Inactive,
            CoachStatus::Inactive => CoachStatus::Active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coach {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub specialties: BTreeSet<String>,
    pub status: CoachStatus,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coach {
    /// Name comparison used everywhere a coach is looked up by display name.
    pub fn is_named(&self, name: &str) -> bool {
        same_name(&self.name, name)
    }

    /// A coach synthesised for an imported slot whose coach did not exist yet.
    pub fn placeholder(id: i64, name: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.trim().to_string(),
            bio: String::new(),
            specialties: BTreeSet::new(),
            status: CoachStatus::Active,
            email: String::new(),
            phone: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCoachRequest {
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub specialties: BTreeSet<String>,
    #[serde(default = "default_status")]
    pub status: CoachStatus,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

fn default_status() -> CoachStatus {
    CoachStatus::Active
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCoachRequest {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub specialties: Option<BTreeSet<String>>,
    pub status: Option<CoachStatus>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachStatusBatch {
    pub ids: Vec<i64>,
    pub status: CoachStatus,
}
