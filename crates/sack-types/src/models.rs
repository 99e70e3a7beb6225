use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role. Fixed when the profile is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Donator,
    Receiver,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Donator => "donator",
            Role::Receiver => "receiver",
        }
    }

    /// Landing page for the role's portal.
    pub fn home_path(self) -> &'static str {
        match self {
            Role::Admin => "/admin",
            Role::Donator => "/donator",
            Role::Receiver => "/receiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "donator" => Ok(Role::Donator),
            "receiver" => Ok(Role::Receiver),
            other => Err(UnknownVariant { kind: "role", value: other.to_string() }),
        }
    }
}

/// Marketplace visibility of a toy. Only the sack operations move a toy
/// between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToyStatus {
    Available,
    Reserved,
    Claimed,
}

impl ToyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ToyStatus::Available => "available",
            ToyStatus::Reserved => "reserved",
            ToyStatus::Claimed => "claimed",
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, ToyStatus::Available)
    }
}

impl fmt::Display for ToyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToyStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ToyStatus::Available),
            "reserved" => Ok(ToyStatus::Reserved),
            "claimed" => Ok(ToyStatus::Claimed),
            other => Err(UnknownVariant { kind: "toy status", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToyCondition {
    New,
    LikeNew,
    #[default]
    Good,
    Fair,
}

impl ToyCondition {
    pub fn as_str(self) -> &'static str {
        match self {
            ToyCondition::New => "new",
            ToyCondition::LikeNew => "like_new",
            ToyCondition::Good => "good",
            ToyCondition::Fair => "fair",
        }
    }
}

impl fmt::Display for ToyCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToyCondition {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ToyCondition::New),
            "like_new" => Ok(ToyCondition::LikeNew),
            "good" => Ok(ToyCondition::Good),
            "fair" => Ok(ToyCondition::Fair),
            other => Err(UnknownVariant { kind: "toy condition", value: other.to_string() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiverPoints {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub total_points: i64,
    pub used_points: i64,
    pub available_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Toy {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub points: i64,
    pub image_url: String,
    pub status: ToyStatus,
    pub donator_id: Option<Uuid>,
    pub condition: ToyCondition,
    pub age_range: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SackItem {
    pub id: Uuid,
    pub receiver_id: Uuid,
    pub toy_id: Uuid,
    pub added_at: DateTime<Utc>,
}

/// A sack item joined with the toy it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SackEntry {
    #[serde(flatten)]
    pub item: SackItem,
    pub toy: Toy,
}

/// Input for a new account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub password_hash: String,
    /// Starting allowance; only meaningful for receivers.
    pub total_points: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewToy {
    pub title: String,
    pub description: Option<String>,
    pub points: i64,
    pub image_url: String,
    pub donator_id: Uuid,
    pub condition: ToyCondition,
    pub age_range: String,
    pub category: String,
}

/// Catalog query. Every field narrows the result; `None` means "any".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToyFilter {
    pub status: Option<ToyStatus>,
    pub donator_id: Option<Uuid>,
    pub category: Option<String>,
    pub age_range: Option<String>,
    pub condition: Option<ToyCondition>,
    pub min_points: Option<i64>,
    pub max_points: Option<i64>,
    #[serde(rename = "q")]
    pub search: Option<String>,
}

/// Stored credentials for a login attempt.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub profile: Profile,
    pub password_hash: String,
}

/// Result of a committed sack mutation: the item that was inserted or
/// deleted, the toy in its new state and the receiver's new balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SackChange {
    pub item: SackItem,
    pub toy: Toy,
    pub points: ReceiverPoints,
}
