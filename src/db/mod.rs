//! Document store: record models and SQL repositories.
//!
//! - `model`: typed records returned by repositories.
//! - `repo`: SQL-only functions that map rows into records.
//!
//! Callers import from `k2k_portal::db`; the repository API and the records
//! are re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{BatchRecord, NewUser, PacketRecord, ProductRecord, UserRecord};
