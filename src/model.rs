use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "customer" => Ok(Role::Customer),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Serial number of a packet: product code, batch code and packet suffix, concatenated.
pub fn compose_serial(product_no: &str, batch_no: &str, packet_no: &str) -> String {
    let mut serial = String::with_capacity(product_no.len() + batch_no.len() + packet_no.len());
    serial.push_str(product_no);
    serial.push_str(batch_no);
    serial.push_str(packet_no);
    serial
}

/// Zero-padded suffixes `1..=count`, at least three digits wide.
pub fn packet_suffixes(count: u32) -> Vec<String> {
    let width = count.to_string().len().max(3);
    (1..=count).map(|n| format!("{n:0width$}")).collect()
}

/// Where the admin lands once every packet of a batch has a report.
pub fn batch_details_path(product_id: &str, batch_id: &str) -> String {
    format!("/admin/{product_id}/{batch_id}/batch_details")
}
