//! Kishan2Kitchen traceability portal.
//!
//! Admins register products, batches and packets and attach refractometer
//! reports; customers sign in by phone OTP (or follow a tokenised deep link)
//! and check a packet's serial number. Identity is delegated to a managed
//! provider, records live in SQLite.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod identity;
pub mod model;
pub mod report;
pub mod session;
