pub mod admin;
pub mod auth;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod router;
pub mod sack;
pub mod state;
pub mod storage;
pub mod toys;
