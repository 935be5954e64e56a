//! Records stored in and returned by the document store.
//!
//! These structs carry data only. Rules about them live in `crate::report`
//! and the API layer.

use crate::model::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub uid: String,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Profile served when the store has nothing for `uid`.
    pub fn fallback(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            name: "User".to_string(),
            email: None,
            phone_number: None,
            role: Role::Customer,
            created_at: None,
            last_login_at: None,
        }
    }
}

/// Fields accepted when creating or merging a user. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct NewUser<'a> {
    pub uid: &'a str,
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub phone_number: Option<&'a str>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductRecord {
    pub id: String,
    pub product_no: String,
    pub name: String,
    pub details: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchRecord {
    pub id: String,
    pub product_id: String,
    pub batch_no: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PacketRecord {
    pub id: String,
    pub product_id: String,
    pub batch_id: String,
    pub product_no: String,
    pub batch_no: String,
    pub packet_no: String,
    pub serial_no: String,
    pub refractometer_report: Option<String>,
    pub reported_at: Option<DateTime<Utc>>,
}

impl PacketRecord {
    /// Missing or `""` means no report yet.
    pub fn has_report(&self) -> bool {
        self.refractometer_report
            .as_deref()
            .is_some_and(|r| !r.is_empty())
    }
}
