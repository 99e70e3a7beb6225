use anyhow::{Context, Result};
use tracing::info;

use sack_api::auth::hash_password;
use sack_db::MarketStore;
use sack_types::models::{NewProfile, Role};
use sack_types::validate;

use crate::config::BootstrapAdmin;

/// Creates the configured admin account unless an admin already exists.
/// Returns whether an account was created.
pub fn ensure_admin(store: &dyn MarketStore, admin: &BootstrapAdmin) -> Result<bool> {
    if store.count_role(Role::Admin)? > 0 {
        return Ok(false);
    }

    let email = validate::email(&admin.email).context("SACK_ADMIN_EMAIL")?;
    validate::password(&admin.password).context("SACK_ADMIN_PASSWORD")?;
    let full_name = validate::full_name(&admin.full_name).context("SACK_ADMIN_NAME")?;

    let profile = store.create_profile(&NewProfile {
        email,
        full_name,
        role: Role::Admin,
        password_hash: hash_password(&admin.password)?,
        total_points: None,
    })?;
    info!("Created bootstrap admin {}", profile.email);
    Ok(true)
}
