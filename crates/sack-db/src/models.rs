//! Database row types, mapped straight from SQLite rows.
//! Distinct from sack-types domain models to keep the DB layer independent;
//! conversion happens once, at the edge of this crate.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use sack_types::models::{Profile, ReceiverPoints, SackItem, Toy};

pub(crate) const PROFILE_COLUMNS: &str = "id, email, full_name, role, created_at, updated_at";
pub(crate) const POINTS_COLUMNS: &str =
    "id, receiver_id, total_points, used_points, available_points, created_at, updated_at";
pub(crate) const TOY_COLUMNS: &str = "id, title, description, points, image_url, status, \
     donator_id, condition, age_range, category, created_at, updated_at";
pub(crate) const SACK_COLUMNS: &str = "id, receiver_id, toy_id, added_at";

/// `"a, b"` -> `"t.a, t.b"`, for joins.
pub(crate) fn qualified(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|column| format!("{alias}.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub struct ProfileRow {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct PointsRow {
    pub id: String,
    pub receiver_id: String,
    pub total_points: i64,
    pub used_points: i64,
    pub available_points: i64,
    pub created_at: String,
    pub updated_at: String,
}

pub struct ToyRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub points: i64,
    pub image_url: String,
    pub status: String,
    pub donator_id: Option<String>,
    pub condition: String,
    pub age_range: String,
    pub category: String,
    pub created_at: String,
    pub updated_at: String,
}

pub struct SackRow {
    pub id: String,
    pub receiver_id: String,
    pub toy_id: String,
    pub added_at: String,
}

impl ProfileRow {
    /// Reads `PROFILE_COLUMNS` starting at column `at`.
    pub(crate) fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(at)?,
            email: row.get(at + 1)?,
            full_name: row.get(at + 2)?,
            role: row.get(at + 3)?,
            created_at: row.get(at + 4)?,
            updated_at: row.get(at + 5)?,
        })
    }

    pub fn into_profile(self) -> Result<Profile> {
        Ok(Profile {
            id: parse_id(&self.id)?,
            role: self.role.parse().with_context(|| format!("profile {}", self.id))?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            email: self.email,
            full_name: self.full_name,
        })
    }
}

impl PointsRow {
    pub(crate) fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(at)?,
            receiver_id: row.get(at + 1)?,
            total_points: row.get(at + 2)?,
            used_points: row.get(at + 3)?,
            available_points: row.get(at + 4)?,
            created_at: row.get(at + 5)?,
            updated_at: row.get(at + 6)?,
        })
    }

    pub fn into_points(self) -> Result<ReceiverPoints> {
        Ok(ReceiverPoints {
            id: parse_id(&self.id)?,
            receiver_id: parse_id(&self.receiver_id)?,
            total_points: self.total_points,
            used_points: self.used_points,
            available_points: self.available_points,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

impl ToyRow {
    pub(crate) fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(at)?,
            title: row.get(at + 1)?,
            description: row.get(at + 2)?,
            points: row.get(at + 3)?,
            image_url: row.get(at + 4)?,
            status: row.get(at + 5)?,
            donator_id: row.get(at + 6)?,
            condition: row.get(at + 7)?,
            age_range: row.get(at + 8)?,
            category: row.get(at + 9)?,
            created_at: row.get(at + 10)?,
            updated_at: row.get(at + 11)?,
        })
    }

    pub fn into_toy(self) -> Result<Toy> {
        Ok(Toy {
            id: parse_id(&self.id)?,
            status: self.status.parse().with_context(|| format!("toy {}", self.id))?,
            condition: self.condition.parse().with_context(|| format!("toy {}", self.id))?,
            donator_id: self.donator_id.as_deref().map(parse_id).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            title: self.title,
            description: self.description,
            points: self.points,
            image_url: self.image_url,
            age_range: self.age_range,
            category: self.category,
        })
    }
}

impl SackRow {
    pub(crate) fn read(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(at)?,
            receiver_id: row.get(at + 1)?,
            toy_id: row.get(at + 2)?,
            added_at: row.get(at + 3)?,
        })
    }

    pub fn into_item(self) -> Result<SackItem> {
        Ok(SackItem {
            id: parse_id(&self.id)?,
            receiver_id: parse_id(&self.receiver_id)?,
            toy_id: parse_id(&self.toy_id)?,
            added_at: parse_timestamp(&self.added_at)?,
        })
    }
}

/// Timestamps are written as RFC 3339 with microseconds so that text
/// ordering matches time ordering.
pub(crate) fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows inserted by hand through the sqlite shell use datetime('now').
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{raw}'"))
}

fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt id '{raw}'"))
}
