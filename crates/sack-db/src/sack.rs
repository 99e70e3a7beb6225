//! The two sack procedures. Each runs in a single `BEGIN IMMEDIATE`
//! transaction on the writer connection, so the toy status flip, the sack
//! row and the ledger update commit together or not at all. The status flip
//! is additionally a compare-and-swap on `status = 'available'`.

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use sack_types::error::MarketError;
use sack_types::ledger::PointsLedger;
use sack_types::models::{SackChange, SackEntry, SackItem};

use crate::Database;
use crate::models::{SACK_COLUMNS, SackRow, TOY_COLUMNS, ToyRow, now_timestamp, qualified};
use crate::queries::{query_points, query_toy, write_ledger};

impl Database {
    pub fn add_toy_to_sack(&self, receiver_id: Uuid, toy_id: Uuid) -> Result<SackChange> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let rid = receiver_id.to_string();
            let tid = toy_id.to_string();

            let toy = query_toy(&tx, &tid)?.ok_or_else(|| MarketError::not_found("toy", toy_id))?;
            if !toy.status.is_available() {
                warn!(receiver_id = %receiver_id, toy_id = %toy_id, status = %toy.status, "Add to sack rejected: toy unavailable");
                return Err(MarketError::ToyUnavailable(toy_id).into());
            }

            let balance = query_points(&tx, &rid)?
                .ok_or_else(|| MarketError::not_found("receiver points", receiver_id))?;
            let ledger = PointsLedger::from_parts(balance.total_points, balance.used_points)
                .charge(toy.points)
                .map_err(|e| {
                    warn!(receiver_id = %receiver_id, toy_id = %toy_id, "Add to sack rejected: {}", e);
                    MarketError::from(e)
                })?;

            let now = now_timestamp();
            let claimed = tx.execute(
                "UPDATE toys SET status = 'claimed', updated_at = ?1 WHERE id = ?2 AND status = 'available'",
                rusqlite::params![now, tid],
            )?;
            if claimed != 1 {
                return Err(MarketError::ToyUnavailable(toy_id).into());
            }

            let item_id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO sack_items (id, receiver_id, toy_id, added_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![item_id, rid, tid, now],
            )?;
            write_ledger(&tx, &rid, ledger)?;

            let change = load_change(&tx, &rid, &tid)?;
            tx.commit()?;

            info!(
                receiver_id = %receiver_id,
                toy_id = %toy_id,
                points = change.toy.points,
                available = change.points.available_points,
                "Toy added to sack"
            );
            Ok(change)
        })
    }

    pub fn remove_toy_from_sack(&self, receiver_id: Uuid, toy_id: Uuid) -> Result<SackChange> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let rid = receiver_id.to_string();
            let tid = toy_id.to_string();

            let Some(item) = query_sack_item(&tx, &rid, &tid)? else {
                warn!(receiver_id = %receiver_id, toy_id = %toy_id, "Remove from sack rejected: not in sack");
                return Err(MarketError::NotInSack(toy_id).into());
            };
            let toy = query_toy(&tx, &tid)?.ok_or_else(|| MarketError::not_found("toy", toy_id))?;
            let balance = query_points(&tx, &rid)?
                .ok_or_else(|| MarketError::not_found("receiver points", receiver_id))?;
            let ledger = PointsLedger::from_parts(balance.total_points, balance.used_points).refund(toy.points);

            tx.execute("DELETE FROM sack_items WHERE id = ?1", [item.id.to_string()])?;
            tx.execute(
                "UPDATE toys SET status = 'available', updated_at = ?1 WHERE id = ?2",
                rusqlite::params![now_timestamp(), tid],
            )?;
            write_ledger(&tx, &rid, ledger)?;

            let toy = query_toy(&tx, &tid)?.ok_or_else(|| MarketError::not_found("toy", toy_id))?;
            let points = query_points(&tx, &rid)?
                .ok_or_else(|| MarketError::not_found("receiver points", receiver_id))?;
            tx.commit()?;

            info!(
                receiver_id = %receiver_id,
                toy_id = %toy_id,
                available = points.available_points,
                "Toy released from sack"
            );
            Ok(SackChange { item, toy, points })
        })
    }

    /// A receiver's sack, oldest item first.
    pub fn get_sack(&self, receiver_id: Uuid) -> Result<Vec<SackEntry>> {
        self.with_conn(|conn| query_sack_entries(conn, Some(&receiver_id.to_string())))
    }

    /// Every sack entry across all receivers.
    pub fn list_sack_entries(&self) -> Result<Vec<SackEntry>> {
        self.with_conn(|conn| query_sack_entries(conn, None))
    }
}

fn query_sack_item(conn: &Connection, receiver_id: &str, toy_id: &str) -> Result<Option<SackItem>> {
    let row = conn
        .query_row(
            &format!("SELECT {SACK_COLUMNS} FROM sack_items WHERE receiver_id = ?1 AND toy_id = ?2"),
            [receiver_id, toy_id],
            |row| SackRow::read(row, 0),
        )
        .optional()?;
    row.map(SackRow::into_item).transpose()
}

fn load_change(conn: &Connection, receiver_id: &str, toy_id: &str) -> Result<SackChange> {
    let item = query_sack_item(conn, receiver_id, toy_id)?
        .ok_or_else(|| anyhow::anyhow!("sack item for toy {} missing after insert", toy_id))?;
    let toy = query_toy(conn, toy_id)?
        .ok_or_else(|| anyhow::anyhow!("toy {} missing after claim", toy_id))?;
    let points = query_points(conn, receiver_id)?
        .ok_or_else(|| anyhow::anyhow!("ledger for {} missing after charge", receiver_id))?;
    Ok(SackChange { item, toy, points })
}

fn query_sack_entries(conn: &Connection, receiver_id: Option<&str>) -> Result<Vec<SackEntry>> {
    let filter = if receiver_id.is_some() { "WHERE s.receiver_id = ?1" } else { "" };
    let sql = format!(
        "SELECT {}, {} FROM sack_items s JOIN toys t ON t.id = s.toy_id {filter}
         ORDER BY s.added_at ASC, s.rowid ASC",
        qualified(SACK_COLUMNS, "s"),
        qualified(TOY_COLUMNS, "t"),
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = match receiver_id {
        Some(rid) => stmt.query_map([rid], read_entry)?.collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt.query_map([], read_entry)?.collect::<std::result::Result<Vec<_>, _>>()?,
    };

    rows.into_iter()
        .map(|(item, toy)| -> Result<SackEntry> {
            Ok(SackEntry {
                item: item.into_item()?,
                toy: toy.into_toy()?,
            })
        })
        .collect()
}

fn read_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<(SackRow, ToyRow)> {
    Ok((SackRow::read(row, 0)?, ToyRow::read(row, 4)?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sack_types::models::{NewProfile, NewToy, Role, ToyCondition, ToyStatus};

    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn profile(db: &Database, email: &str, role: Role, points: Option<i64>) -> Uuid {
        db.create_profile(&NewProfile {
            email: email.to_string(),
            full_name: email.to_string(),
            role,
            password_hash: "not-a-real-hash".to_string(),
            total_points: points,
        })
        .unwrap()
        .id
    }

    fn toy(db: &Database, donator: Uuid, points: i64) -> Uuid {
        db.insert_toy(&NewToy {
            title: format!("{points}-point toy"),
            description: None,
            points,
            image_url: "http://localhost/images/toy.png".to_string(),
            donator_id: donator,
            condition: ToyCondition::Good,
            age_range: "3-5".to_string(),
            category: "puzzles".to_string(),
        })
        .unwrap()
        .id
    }

    fn market_err(err: anyhow::Error) -> MarketError {
        err.downcast::<MarketError>().expect("expected a domain error")
    }

    /// used_points equals the sum of held toy points, and available is derived.
    fn assert_ledger_consistent(db: &Database, receiver: Uuid) {
        let points = db.get_receiver_points(receiver).unwrap().unwrap();
        let held: i64 = db.get_sack(receiver).unwrap().iter().map(|e| e.toy.points).sum();
        assert_eq!(points.used_points, held);
        assert_eq!(points.available_points, points.total_points - points.used_points);
        assert!(points.available_points >= 0);
    }

    #[test]
    fn add_then_remove_round_trips_the_ledger() {
        let db = db();
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let receiver = profile(&db, "kid@home.org", Role::Receiver, Some(100));
        let toy_id = toy(&db, donator, 30);

        let change = db.add_toy_to_sack(receiver, toy_id).unwrap();
        assert_eq!(change.points.used_points, 30);
        assert_eq!(change.points.available_points, 70);
        assert_eq!(change.toy.status, ToyStatus::Claimed);
        assert_eq!(change.item.toy_id, toy_id);
        assert_ledger_consistent(&db, receiver);

        let change = db.remove_toy_from_sack(receiver, toy_id).unwrap();
        assert_eq!(change.points.used_points, 0);
        assert_eq!(change.points.available_points, 100);
        assert_eq!(change.toy.status, ToyStatus::Available);
        assert!(db.get_sack(receiver).unwrap().is_empty());
        assert_ledger_consistent(&db, receiver);
    }

    #[test]
    fn insufficient_points_leave_state_unchanged() {
        let db = db();
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let receiver = profile(&db, "kid@home.org", Role::Receiver, Some(10));
        let toy_id = toy(&db, donator, 30);

        let err = market_err(db.add_toy_to_sack(receiver, toy_id).unwrap_err());
        assert!(matches!(err, MarketError::Ledger(_)));

        let points = db.get_receiver_points(receiver).unwrap().unwrap();
        assert_eq!(points.used_points, 0);
        assert_eq!(points.available_points, 10);
        assert_eq!(db.get_toy(toy_id).unwrap().unwrap().status, ToyStatus::Available);
        assert!(db.get_sack(receiver).unwrap().is_empty());
    }

    #[test]
    fn claimed_toy_cannot_be_added_again() {
        let db = db();
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let first = profile(&db, "first@home.org", Role::Receiver, Some(100));
        let second = profile(&db, "second@home.org", Role::Receiver, Some(100));
        let toy_id = toy(&db, donator, 25);

        db.add_toy_to_sack(first, toy_id).unwrap();

        let err = market_err(db.add_toy_to_sack(second, toy_id).unwrap_err());
        assert!(matches!(err, MarketError::ToyUnavailable(id) if id == toy_id));
        let err = market_err(db.add_toy_to_sack(first, toy_id).unwrap_err());
        assert!(matches!(err, MarketError::ToyUnavailable(_)));

        let second_points = db.get_receiver_points(second).unwrap().unwrap();
        assert_eq!(second_points.used_points, 0);
        assert_ledger_consistent(&db, first);
        assert_ledger_consistent(&db, second);
    }

    #[test]
    fn double_remove_is_rejected() {
        let db = db();
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let receiver = profile(&db, "kid@home.org", Role::Receiver, Some(100));
        let toy_id = toy(&db, donator, 40);

        db.add_toy_to_sack(receiver, toy_id).unwrap();
        db.remove_toy_from_sack(receiver, toy_id).unwrap();

        let err = market_err(db.remove_toy_from_sack(receiver, toy_id).unwrap_err());
        assert!(matches!(err, MarketError::NotInSack(id) if id == toy_id));
        let points = db.get_receiver_points(receiver).unwrap().unwrap();
        assert_eq!(points.used_points, 0);
        assert_eq!(points.available_points, 100);
    }

    #[test]
    fn removing_from_someone_elses_sack_is_rejected() {
        let db = db();
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let owner = profile(&db, "owner@home.org", Role::Receiver, Some(100));
        let other = profile(&db, "other@home.org", Role::Receiver, Some(100));
        let toy_id = toy(&db, donator, 15);

        db.add_toy_to_sack(owner, toy_id).unwrap();
        let err = market_err(db.remove_toy_from_sack(other, toy_id).unwrap_err());
        assert!(matches!(err, MarketError::NotInSack(_)));
        assert_eq!(db.get_toy(toy_id).unwrap().unwrap().status, ToyStatus::Claimed);
        assert_ledger_consistent(&db, owner);
    }

    #[test]
    fn unknown_toy_and_non_receiver_are_not_found() {
        let db = db();
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let receiver = profile(&db, "kid@home.org", Role::Receiver, None);
        let toy_id = toy(&db, donator, 5);

        let err = market_err(db.add_toy_to_sack(receiver, Uuid::new_v4()).unwrap_err());
        assert!(matches!(err, MarketError::NotFound { entity: "toy", .. }));

        // Donators have no ledger.
        let err = market_err(db.add_toy_to_sack(donator, toy_id).unwrap_err());
        assert!(matches!(err, MarketError::NotFound { entity: "receiver points", .. }));
        assert_eq!(db.get_toy(toy_id).unwrap().unwrap().status, ToyStatus::Available);
    }

    #[test]
    fn status_is_available_iff_unreferenced() {
        let db = db();
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let receiver = profile(&db, "kid@home.org", Role::Receiver, Some(100));
        let toys: Vec<Uuid> = [10, 20, 30].into_iter().map(|p| toy(&db, donator, p)).collect();

        db.add_toy_to_sack(receiver, toys[0]).unwrap();
        db.add_toy_to_sack(receiver, toys[2]).unwrap();

        let held: Vec<Uuid> = db.list_sack_entries().unwrap().iter().map(|e| e.toy.id).collect();
        for id in &toys {
            let status = db.get_toy(*id).unwrap().unwrap().status;
            assert_eq!(status.is_available(), !held.contains(id));
        }
        assert_ledger_consistent(&db, receiver);
        assert_eq!(db.get_receiver_points(receiver).unwrap().unwrap().used_points, 40);
    }

    #[test]
    fn concurrent_claims_have_exactly_one_winner() {
        let db = Arc::new(db());
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let toy_id = toy(&db, donator, 50);
        let receivers: Vec<Uuid> = (0..8)
            .map(|i| profile(&db, &format!("kid{i}@home.org"), Role::Receiver, Some(100)))
            .collect();

        let handles: Vec<_> = receivers
            .iter()
            .map(|&receiver| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || db.add_toy_to_sack(receiver, toy_id).is_ok())
            })
            .collect();
        let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();

        assert_eq!(wins, 1);
        assert_eq!(db.list_sack_entries().unwrap().len(), 1);
        let spent: i64 = receivers
            .iter()
            .map(|r| db.get_receiver_points(*r).unwrap().unwrap().used_points)
            .sum();
        assert_eq!(spent, 50);
        for receiver in receivers {
            assert_ledger_consistent(&db, receiver);
        }
    }

    #[test]
    fn allowance_edits_respect_spent_points() {
        let db = db();
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let receiver = profile(&db, "kid@home.org", Role::Receiver, Some(100));
        let toy_id = toy(&db, donator, 60);
        db.add_toy_to_sack(receiver, toy_id).unwrap();

        let err = market_err(db.set_total_points(receiver, 50).unwrap_err());
        assert!(matches!(err, MarketError::Ledger(_)));
        assert_eq!(db.get_receiver_points(receiver).unwrap().unwrap().total_points, 100);

        let points = db.set_total_points(receiver, 80).unwrap();
        assert_eq!(points.used_points, 60);
        assert_eq!(points.available_points, 20);
        assert_ledger_consistent(&db, receiver);
    }

    #[test]
    fn held_toys_cannot_be_deleted() {
        let db = db();
        let donator = profile(&db, "elf@north.pole", Role::Donator, None);
        let receiver = profile(&db, "kid@home.org", Role::Receiver, Some(100));
        let toy_id = toy(&db, donator, 10);
        db.add_toy_to_sack(receiver, toy_id).unwrap();

        let err = market_err(db.delete_toy(toy_id).unwrap_err());
        assert!(matches!(err, MarketError::Conflict(_)));

        db.remove_toy_from_sack(receiver, toy_id).unwrap();
        let deleted = db.delete_toy(toy_id).unwrap();
        assert_eq!(deleted.id, toy_id);
        assert!(db.get_toy(toy_id).unwrap().is_none());
    }
}
