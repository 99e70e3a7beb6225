use chrono::{DateTime, Utc};
use tracing::error;
use uuid::Uuid;

use sack_types::error::{MarketError, MarketResult};
use sack_types::models::{
    Credentials, NewProfile, NewToy, Profile, ReceiverPoints, Role, SackChange, SackEntry, Toy,
    ToyFilter,
};

use crate::Database;

/// Data-access interface handed to the HTTP layer. Calls are blocking;
/// async callers should run them on the blocking pool.
///
/// `add_toy_to_sack` and `remove_toy_from_sack` must be atomic: on error no
/// part of the mutation may be visible.
pub trait MarketStore: Send + Sync {
    // Profiles
    fn create_profile(&self, new: &NewProfile) -> MarketResult<Profile>;
    fn credentials(&self, email: &str) -> MarketResult<Option<Credentials>>;
    fn profile(&self, id: Uuid) -> MarketResult<Option<Profile>>;
    fn list_profiles(&self) -> MarketResult<Vec<Profile>>;
    fn count_role(&self, role: Role) -> MarketResult<i64>;

    // Points ledger
    fn receiver_points(&self, receiver_id: Uuid) -> MarketResult<ReceiverPoints>;
    fn list_receiver_points(&self) -> MarketResult<Vec<ReceiverPoints>>;
    fn set_total_points(&self, receiver_id: Uuid, total_points: i64) -> MarketResult<ReceiverPoints>;

    // Catalog
    fn create_toy(&self, new: &NewToy) -> MarketResult<Toy>;
    fn list_toys(&self, filter: &ToyFilter) -> MarketResult<Vec<Toy>>;
    fn delete_toy(&self, id: Uuid) -> MarketResult<Toy>;

    // Sacks
    fn add_toy_to_sack(&self, receiver_id: Uuid, toy_id: Uuid) -> MarketResult<SackChange>;
    fn remove_toy_from_sack(&self, receiver_id: Uuid, toy_id: Uuid) -> MarketResult<SackChange>;
    fn sack(&self, receiver_id: Uuid) -> MarketResult<Vec<SackEntry>>;
    fn all_sack_entries(&self) -> MarketResult<Vec<SackEntry>>;

    // Sessions
    fn revoke_session(&self, jti: Uuid, expires_at: DateTime<Utc>) -> MarketResult<()>;
    fn is_session_revoked(&self, jti: Uuid) -> MarketResult<bool>;
    fn prune_revoked_sessions(&self, now: DateTime<Utc>) -> MarketResult<usize>;
}

/// Recovers a domain error raised inside a query; anything else is a
/// backend fault.
fn classify(err: anyhow::Error) -> MarketError {
    match err.downcast::<MarketError>() {
        Ok(domain) => domain,
        Err(other) => {
            error!("Database error: {:#}", other);
            MarketError::Backend(format!("{other:#}"))
        }
    }
}

impl MarketStore for Database {
    fn create_profile(&self, new: &NewProfile) -> MarketResult<Profile> {
        Database::create_profile(self, new).map_err(classify)
    }

    fn credentials(&self, email: &str) -> MarketResult<Option<Credentials>> {
        self.get_credentials(email).map_err(classify)
    }

    fn profile(&self, id: Uuid) -> MarketResult<Option<Profile>> {
        self.get_profile(id).map_err(classify)
    }

    fn list_profiles(&self) -> MarketResult<Vec<Profile>> {
        Database::list_profiles(self).map_err(classify)
    }

    fn count_role(&self, role: Role) -> MarketResult<i64> {
        self.count_profiles_with_role(role).map_err(classify)
    }

    fn receiver_points(&self, receiver_id: Uuid) -> MarketResult<ReceiverPoints> {
        self.get_receiver_points(receiver_id)
            .map_err(classify)?
            .ok_or_else(|| MarketError::not_found("receiver points", receiver_id))
    }

    fn list_receiver_points(&self) -> MarketResult<Vec<ReceiverPoints>> {
        Database::list_receiver_points(self).map_err(classify)
    }

    fn set_total_points(&self, receiver_id: Uuid, total_points: i64) -> MarketResult<ReceiverPoints> {
        Database::set_total_points(self, receiver_id, total_points).map_err(classify)
    }

    fn create_toy(&self, new: &NewToy) -> MarketResult<Toy> {
        self.insert_toy(new).map_err(classify)
    }

    fn list_toys(&self, filter: &ToyFilter) -> MarketResult<Vec<Toy>> {
        Database::list_toys(self, filter).map_err(classify)
    }

    fn delete_toy(&self, id: Uuid) -> MarketResult<Toy> {
        Database::delete_toy(self, id).map_err(classify)
    }

    fn add_toy_to_sack(&self, receiver_id: Uuid, toy_id: Uuid) -> MarketResult<SackChange> {
        Database::add_toy_to_sack(self, receiver_id, toy_id).map_err(classify)
    }

    fn remove_toy_from_sack(&self, receiver_id: Uuid, toy_id: Uuid) -> MarketResult<SackChange> {
        Database::remove_toy_from_sack(self, receiver_id, toy_id).map_err(classify)
    }

    fn sack(&self, receiver_id: Uuid) -> MarketResult<Vec<SackEntry>> {
        self.get_sack(receiver_id).map_err(classify)
    }

    fn all_sack_entries(&self) -> MarketResult<Vec<SackEntry>> {
        self.list_sack_entries().map_err(classify)
    }

    fn revoke_session(&self, jti: Uuid, expires_at: DateTime<Utc>) -> MarketResult<()> {
        Database::revoke_session(self, jti, expires_at).map_err(classify)
    }

    fn is_session_revoked(&self, jti: Uuid) -> MarketResult<bool> {
        Database::is_session_revoked(self, jti).map_err(classify)
    }

    fn prune_revoked_sessions(&self, now: DateTime<Utc>) -> MarketResult<usize> {
        Database::prune_revoked_sessions(self, now).map_err(classify)
    }
}
