use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::info;
use uuid::Uuid;

use sack_types::error::MarketError;
use sack_types::ledger::PointsLedger;
use sack_types::models::{
    Credentials, NewProfile, NewToy, Profile, ReceiverPoints, Role, Toy, ToyFilter,
};

use crate::Database;
use crate::models::{
    POINTS_COLUMNS, PROFILE_COLUMNS, PointsRow, ProfileRow, TOY_COLUMNS, ToyRow,
    format_timestamp, now_timestamp,
};

/// Allowance given to receivers created without an explicit amount.
pub const DEFAULT_RECEIVER_POINTS: i64 = 100;

impl Database {
    // -- Profiles --

    /// Inserts the profile and, for receivers, its ledger row in one
    /// transaction.
    pub fn create_profile(&self, new: &NewProfile) -> Result<Profile> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM profiles WHERE email = ?1)",
                [&new.email],
                |row| row.get(0),
            )?;
            if taken {
                return Err(MarketError::Conflict(format!("email {} is already registered", new.email)).into());
            }

            let id = Uuid::new_v4().to_string();
            let now = now_timestamp();
            tx.execute(
                "INSERT INTO profiles (id, email, full_name, role, password, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![id, new.email, new.full_name, new.role.as_str(), new.password_hash, now],
            )?;

            match new.role {
                Role::Receiver => {
                    let ledger = PointsLedger::new(new.total_points.unwrap_or(DEFAULT_RECEIVER_POINTS))
                        .map_err(MarketError::from)?;
                    tx.execute(
                        "INSERT INTO receiver_points
                             (id, receiver_id, total_points, used_points, available_points, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                        rusqlite::params![
                            Uuid::new_v4().to_string(),
                            id,
                            ledger.total(),
                            ledger.used(),
                            ledger.available(),
                            now
                        ],
                    )?;
                }
                Role::Admin | Role::Donator => {}
            }

            let profile = query_profile(&tx, &id)?
                .ok_or_else(|| anyhow::anyhow!("profile {} vanished inside its own transaction", id))?;
            tx.commit()?;

            info!(profile_id = %profile.id, role = %profile.role, "Profile created");
            Ok(profile)
        })
    }

    pub fn get_credentials(&self, email: &str) -> Result<Option<Credentials>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {PROFILE_COLUMNS}, password FROM profiles WHERE email = ?1"),
                    [email],
                    |row| Ok((ProfileRow::read(row, 0)?, row.get::<_, String>(6)?)),
                )
                .optional()?;

            row.map(|(profile, password_hash)| -> Result<Credentials> {
                Ok(Credentials {
                    profile: profile.into_profile()?,
                    password_hash,
                })
            })
            .transpose()
        })
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| query_profile(conn, &id.to_string()))
    }

    /// Newest first.
    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt
                .query_map([], |row| ProfileRow::read(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ProfileRow::into_profile).collect()
        })
    }

    pub fn count_profiles_with_role(&self, role: Role) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM profiles WHERE role = ?1",
                [role.as_str()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Receiver points --

    pub fn get_receiver_points(&self, receiver_id: Uuid) -> Result<Option<ReceiverPoints>> {
        self.with_conn(|conn| query_points(conn, &receiver_id.to_string()))
    }

    pub fn list_receiver_points(&self) -> Result<Vec<ReceiverPoints>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {POINTS_COLUMNS} FROM receiver_points"))?;
            let rows = stmt
                .query_map([], |row| PointsRow::read(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(PointsRow::into_points).collect()
        })
    }

    /// Admin edit of a receiver's allowance. `used_points` is left alone and
    /// `available_points` recomputed; totals below what is already spent are
    /// rejected.
    pub fn set_total_points(&self, receiver_id: Uuid, total_points: i64) -> Result<ReceiverPoints> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let rid = receiver_id.to_string();

            let current = query_points(&tx, &rid)?
                .ok_or_else(|| MarketError::not_found("receiver points", receiver_id))?;
            let ledger = PointsLedger::from_parts(current.total_points, current.used_points)
                .with_total(total_points)
                .map_err(MarketError::from)?;

            write_ledger(&tx, &rid, ledger)?;
            let updated = query_points(&tx, &rid)?
                .ok_or_else(|| MarketError::not_found("receiver points", receiver_id))?;
            tx.commit()?;

            info!(
                receiver_id = %receiver_id,
                total = updated.total_points,
                available = updated.available_points,
                "Receiver allowance updated"
            );
            Ok(updated)
        })
    }

    // -- Toys --

    /// New toys always start `available`.
    pub fn insert_toy(&self, new: &NewToy) -> Result<Toy> {
        self.with_conn(|conn| {
            let id = Uuid::new_v4().to_string();
            let now = now_timestamp();
            conn.execute(
                "INSERT INTO toys
                     (id, title, description, points, image_url, status, donator_id,
                      condition, age_range, category, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'available', ?6, ?7, ?8, ?9, ?10, ?10)",
                rusqlite::params![
                    id,
                    new.title,
                    new.description,
                    new.points,
                    new.image_url,
                    new.donator_id.to_string(),
                    new.condition.as_str(),
                    new.age_range,
                    new.category,
                    now
                ],
            )?;
            query_toy(conn, &id)?.ok_or_else(|| anyhow::anyhow!("toy {} missing after insert", id))
        })
    }

    pub fn get_toy(&self, id: Uuid) -> Result<Option<Toy>> {
        self.with_conn(|conn| query_toy(conn, &id.to_string()))
    }

    /// Newest first.
    pub fn list_toys(&self, filter: &ToyFilter) -> Result<Vec<Toy>> {
        self.with_conn(|conn| {
            let mut clauses: Vec<String> = Vec::new();
            let mut params: Vec<Box<dyn ToSql>> = Vec::new();

            let mut push = |clause: &str, value: Box<dyn ToSql>| {
                params.push(value);
                clauses.push(clause.replace("?#", &format!("?{}", params.len())));
            };

            if let Some(status) = filter.status {
                push("status = ?#", Box::new(status.as_str()));
            }
            if let Some(donator_id) = filter.donator_id {
                push("donator_id = ?#", Box::new(donator_id.to_string()));
            }
            if let Some(category) = non_blank(&filter.category) {
                push("category = ?#", Box::new(category));
            }
            if let Some(age_range) = non_blank(&filter.age_range) {
                push("age_range = ?#", Box::new(age_range));
            }
            if let Some(condition) = filter.condition {
                push("condition = ?#", Box::new(condition.as_str()));
            }
            if let Some(min) = filter.min_points {
                push("points >= ?#", Box::new(min));
            }
            if let Some(max) = filter.max_points {
                push("points <= ?#", Box::new(max));
            }
            if let Some(search) = non_blank(&filter.search) {
                push(
                    "(fold_case(title) LIKE ?# ESCAPE '\\' OR fold_case(coalesce(description, '')) LIKE ?# ESCAPE '\\')",
                    Box::new(format!("%{}%", escape_like(&search))),
                );
            }

            let where_clause = if clauses.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", clauses.join(" AND "))
            };
            let sql = format!(
                "SELECT {TOY_COLUMNS} FROM toys {where_clause} ORDER BY created_at DESC, rowid DESC"
            );

            let mut stmt = conn.prepare(&sql)?;
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(refs.as_slice(), |row| ToyRow::read(row, 0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.into_iter().map(ToyRow::into_toy).collect()
        })
    }

    /// Removes a toy from inventory. Toys currently held in a sack must be
    /// released first.
    pub fn delete_toy(&self, id: Uuid) -> Result<Toy> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let tid = id.to_string();

            let toy = query_toy(&tx, &tid)?.ok_or_else(|| MarketError::not_found("toy", id))?;
            let held: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM sack_items WHERE toy_id = ?1)",
                [&tid],
                |row| row.get(0),
            )?;
            if held {
                return Err(MarketError::Conflict(format!("toy {id} is in a receiver's sack")).into());
            }

            tx.execute("DELETE FROM toys WHERE id = ?1", [&tid])?;
            tx.commit()?;

            info!(toy_id = %id, "Toy removed from inventory");
            Ok(toy)
        })
    }

    // -- Sessions --

    pub fn revoke_session(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO revoked_sessions (jti, expires_at) VALUES (?1, ?2)",
                rusqlite::params![jti.to_string(), format_timestamp(expires_at)],
            )?;
            Ok(())
        })
    }

    pub fn is_session_revoked(&self, jti: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let revoked = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM revoked_sessions WHERE jti = ?1)",
                [jti.to_string()],
                |row| row.get(0),
            )?;
            Ok(revoked)
        })
    }

    /// Drops revocations whose tokens have expired anyway.
    pub fn prune_revoked_sessions(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM revoked_sessions WHERE expires_at < ?1",
                [format_timestamp(now)],
            )?;
            Ok(removed)
        })
    }
}

pub(crate) fn query_profile(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    let row = conn
        .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            [id],
            |row| ProfileRow::read(row, 0),
        )
        .optional()?;
    row.map(ProfileRow::into_profile).transpose()
}

pub(crate) fn query_points(conn: &Connection, receiver_id: &str) -> Result<Option<ReceiverPoints>> {
    let row = conn
        .query_row(
            &format!("SELECT {POINTS_COLUMNS} FROM receiver_points WHERE receiver_id = ?1"),
            [receiver_id],
            |row| PointsRow::read(row, 0),
        )
        .optional()?;
    row.map(PointsRow::into_points).transpose()
}

pub(crate) fn query_toy(conn: &Connection, id: &str) -> Result<Option<Toy>> {
    let row = conn
        .query_row(
            &format!("SELECT {TOY_COLUMNS} FROM toys WHERE id = ?1"),
            [id],
            |row| ToyRow::read(row, 0),
        )
        .optional()?;
    row.map(ToyRow::into_toy).transpose()
}

/// Writes all three balance columns together.
pub(crate) fn write_ledger(conn: &Connection, receiver_id: &str, ledger: PointsLedger) -> Result<()> {
    conn.execute(
        "UPDATE receiver_points
         SET total_points = ?1, used_points = ?2, available_points = ?3, updated_at = ?4
         WHERE receiver_id = ?5",
        rusqlite::params![
            ledger.total(),
            ledger.used(),
            ledger.available(),
            now_timestamp(),
            receiver_id
        ],
    )?;
    Ok(())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use sack_types::models::{ToyCondition, ToyStatus};

    use super::*;

    fn seed() -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let donator = db
            .create_profile(&NewProfile {
                email: "elf@north.pole".to_string(),
                full_name: "Elf".to_string(),
                role: Role::Donator,
                password_hash: "hash".to_string(),
                total_points: None,
            })
            .unwrap()
            .id;

        let toys = [
            ("Wooden train", Some("pull-along, 100% oak"), 15, ToyCondition::New, "1-3", "vehicles"),
            ("Puzzle box", None, 30, ToyCondition::Good, "6-9", "puzzles"),
            ("Race car", Some("remote controlled"), 45, ToyCondition::LikeNew, "6-9", "vehicles"),
        ];
        for (title, description, points, condition, age_range, category) in toys {
            db.insert_toy(&NewToy {
                title: title.to_string(),
                description: description.map(str::to_string),
                points,
                image_url: "http://localhost/images/x.png".to_string(),
                donator_id: donator,
                condition,
                age_range: age_range.to_string(),
                category: category.to_string(),
            })
            .unwrap();
        }
        (db, donator)
    }

    fn titles(toys: &[Toy]) -> Vec<&str> {
        toys.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn new_toys_start_available_newest_first() {
        let (db, donator) = seed();
        let toys = db.list_toys(&ToyFilter::default()).unwrap();
        assert_eq!(titles(&toys), vec!["Race car", "Puzzle box", "Wooden train"]);
        assert!(toys.iter().all(|t| t.status == ToyStatus::Available));
        assert!(toys.iter().all(|t| t.donator_id == Some(donator)));
    }

    #[test]
    fn filters_combine() {
        let (db, _) = seed();
        let filter = ToyFilter {
            category: Some(" Vehicles ".to_string()),
            max_points: Some(40),
            ..ToyFilter::default()
        };
        assert_eq!(titles(&db.list_toys(&filter).unwrap()), vec!["Wooden train"]);

        let filter = ToyFilter {
            age_range: Some("6-9".to_string()),
            condition: Some(ToyCondition::Good),
            ..ToyFilter::default()
        };
        assert_eq!(titles(&db.list_toys(&filter).unwrap()), vec!["Puzzle box"]);

        let filter = ToyFilter { min_points: Some(30), ..ToyFilter::default() };
        assert_eq!(titles(&db.list_toys(&filter).unwrap()), vec!["Race car", "Puzzle box"]);
    }

    #[test]
    fn search_matches_title_or_description_literally() {
        let (db, _) = seed();
        let search = |q: &str| {
            let filter = ToyFilter { search: Some(q.to_string()), ..ToyFilter::default() };
            db.list_toys(&filter).unwrap()
        };
        assert_eq!(titles(&search("REMOTE")), vec!["Race car"]);
        assert_eq!(titles(&search("100%")), vec!["Wooden train"]);
        assert_eq!(titles(&search("%")), vec!["Wooden train"]);
        assert!(search("_").is_empty());
    }

    #[test]
    fn search_folds_non_ascii_capitals() {
        let (db, donator) = seed();
        db.insert_toy(&NewToy {
            title: "Éclair Bakery".to_string(),
            description: Some("Wooden café set with ÖLÜDENIZ stickers".to_string()),
            points: 20,
            image_url: "http://localhost/images/y.png".to_string(),
            donator_id: donator,
            condition: ToyCondition::Good,
            age_range: "3-5".to_string(),
            category: "pretend play".to_string(),
        })
        .unwrap();

        let search = |q: &str| {
            let filter = ToyFilter { search: Some(q.to_string()), ..ToyFilter::default() };
            db.list_toys(&filter).unwrap()
        };
        assert_eq!(titles(&search("Éclair")), vec!["Éclair Bakery"]);
        assert_eq!(titles(&search("éCLAIR")), vec!["Éclair Bakery"]);
        assert_eq!(titles(&search("ölüdeniz")), vec!["Éclair Bakery"]);
    }

    #[test]
    fn status_and_donator_filters() {
        let (db, donator) = seed();
        let filter = ToyFilter { status: Some(ToyStatus::Claimed), ..ToyFilter::default() };
        assert!(db.list_toys(&filter).unwrap().is_empty());

        let filter = ToyFilter { donator_id: Some(donator), ..ToyFilter::default() };
        assert_eq!(db.list_toys(&filter).unwrap().len(), 3);
        let filter = ToyFilter { donator_id: Some(Uuid::new_v4()), ..ToyFilter::default() };
        assert!(db.list_toys(&filter).unwrap().is_empty());
    }

    #[test]
    fn out_of_range_points_are_refused_by_the_schema() {
        let (db, donator) = seed();
        let result = db.insert_toy(&NewToy {
            title: "Too precious".to_string(),
            description: None,
            points: 101,
            image_url: "http://localhost/images/x.png".to_string(),
            donator_id: donator,
            condition: ToyCondition::New,
            age_range: "all ages".to_string(),
            category: "other".to_string(),
        });
        assert!(result.is_err());
    }
}
