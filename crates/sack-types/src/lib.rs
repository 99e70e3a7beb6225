pub mod api;
pub mod error;
pub mod ledger;
pub mod models;
pub mod validate;
