//! Database module for fleetwatch.
//!
//! Provides SQLite heartbeat storage with embedded migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
