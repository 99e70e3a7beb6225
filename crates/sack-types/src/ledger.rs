//! Receiver point balances.
//!
//! A ledger only stores `total` and `used`; `available` is always derived,
//! so a balance can never be persisted inconsistently as long as every
//! write goes through [`PointsLedger`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("insufficient points: {required} required, {available} available")]
    InsufficientPoints { required: i64, available: i64 },

    #[error("total points cannot be negative (got {0})")]
    NegativeTotal(i64),

    #[error("total points {total} would fall below the {used} points already in use")]
    TotalBelowUsed { total: i64, used: i64 },

    #[error("point cost must be positive (got {0})")]
    InvalidCost(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsLedger {
    total: i64,
    used: i64,
}

impl PointsLedger {
    /// Fresh allowance with nothing spent.
    pub fn new(total: i64) -> Result<Self, LedgerError> {
        if total < 0 {
            return Err(LedgerError::NegativeTotal(total));
        }
        Ok(Self { total, used: 0 })
    }

    /// Rebuild from stored columns. Stored `used` values outside `0..=total`
    /// are clamped into range.
    pub fn from_parts(total: i64, used: i64) -> Self {
        let total = total.max(0);
        Self { total, used: used.clamp(0, total) }
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn used(&self) -> i64 {
        self.used
    }

    pub fn available(&self) -> i64 {
        self.total - self.used
    }

    /// Spend `cost` points. Fails without changing anything if the balance
    /// does not cover it.
    pub fn charge(self, cost: i64) -> Result<Self, LedgerError> {
        if cost <= 0 {
            return Err(LedgerError::InvalidCost(cost));
        }
        if cost > self.available() {
            return Err(LedgerError::InsufficientPoints {
                required: cost,
                available: self.available(),
            });
        }
        Ok(Self { used: self.used + cost, ..self })
    }

    /// Give `cost` points back. `used` never drops below zero.
    pub fn refund(self, cost: i64) -> Self {
        Self { used: (self.used - cost.max(0)).max(0), ..self }
    }

    /// Replace the allowance. Rejected if it would leave spent points
    /// uncovered.
    pub fn with_total(self, total: i64) -> Result<Self, LedgerError> {
        if total < 0 {
            return Err(LedgerError::NegativeTotal(total));
        }
        if total < self.used {
            return Err(LedgerError::TotalBelowUsed { total, used: self.used });
        }
        Ok(Self { total, ..self })
    }
}
