//! Form-level checks shared by registration, account creation and toy
//! uploads. Each returns the cleaned value or a `Validation` error whose
//! message can be shown next to the offending field.

use crate::error::{MarketError, MarketResult};

pub const MIN_TOY_POINTS: i64 = 1;
pub const MAX_TOY_POINTS: i64 = 100;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_TITLE_LEN: usize = 120;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_LABEL_LEN: usize = 60;
pub const DEFAULT_AGE_RANGE: &str = "all ages";
pub const DEFAULT_CATEGORY: &str = "other";

/// Trimmed, lower-cased email with a minimal shape check.
pub fn email(raw: &str) -> MarketResult<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(MarketError::validation("a valid email address is required"));
    }
    Ok(email)
}

pub fn password(raw: &str) -> MarketResult<()> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(MarketError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn full_name(raw: &str) -> MarketResult<String> {
    required("full name", raw, MAX_TITLE_LEN)
}

pub fn toy_title(raw: &str) -> MarketResult<String> {
    required("title", raw, MAX_TITLE_LEN)
}

/// Empty descriptions are stored as `None`.
pub fn toy_description(raw: Option<&str>) -> MarketResult<Option<String>> {
    let Some(text) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(MarketError::validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(Some(text.to_string()))
}

pub fn toy_points(points: i64) -> MarketResult<i64> {
    if !(MIN_TOY_POINTS..=MAX_TOY_POINTS).contains(&points) {
        return Err(MarketError::validation(format!(
            "points must be between {MIN_TOY_POINTS} and {MAX_TOY_POINTS}"
        )));
    }
    Ok(points)
}

/// Free-text catalog label (age range, category). Blank falls back to
/// `default`.
pub fn label(field: &str, raw: Option<&str>, default: &str) -> MarketResult<String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) if value.chars().count() > MAX_LABEL_LEN => Err(MarketError::validation(
            format!("{field} must be at most {MAX_LABEL_LEN} characters"),
        )),
        Some(value) => Ok(value.to_lowercase()),
        None => Ok(default.to_string()),
    }
}

fn required(field: &str, raw: &str, max: usize) -> MarketResult<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(MarketError::validation(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(MarketError::validation(format!("{field} must be at most {max} characters")));
    }
    Ok(value.to_string())
}
