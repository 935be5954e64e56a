//! Refractometer report attachment rules.

use serde::Serialize;
use tracing::{info, instrument};

use crate::db::{self, PacketRecord, Pool};
use crate::error::AppError;
use crate::model::{batch_details_path, compose_serial};

pub const MISSING_FIELDS: &str = "Please enter the packet number and refractometer report.";
pub const UNKNOWN_PACKET: &str = "Invalid packet number or already exists";
pub const ALREADY_REPORTED: &str = "Refractometer report already exists for this packet.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingFields,
    UnknownPacket,
    AlreadyReported,
}

impl From<Rejection> for AppError {
    fn from(r: Rejection) -> Self {
        match r {
            Rejection::MissingFields => AppError::BadRequest(MISSING_FIELDS.into()),
            Rejection::UnknownPacket => AppError::NotFound(UNKNOWN_PACKET.into()),
            Rejection::AlreadyReported => AppError::Conflict(ALREADY_REPORTED.into()),
        }
    }
}

/// Linear scan for the packet whose serial is its own product and batch
/// numbers followed by `packet_no`.
pub fn resolve_packet<'a>(packets: &'a [PacketRecord], packet_no: &str) -> Option<&'a PacketRecord> {
    packets
        .iter()
        .find(|p| p.serial_no == compose_serial(&p.product_no, &p.batch_no, packet_no))
}

/// Pick the packet a new report may go to.
pub fn check_report<'a>(
    packets: &'a [PacketRecord],
    packet_no: &str,
    report: &str,
) -> Result<&'a PacketRecord, Rejection> {
    if packet_no.trim().is_empty() || report.trim().is_empty() {
        return Err(Rejection::MissingFields);
    }
    let packet = resolve_packet(packets, packet_no.trim()).ok_or(Rejection::UnknownPacket)?;
    if packet.has_report() {
        return Err(Rejection::AlreadyReported);
    }
    Ok(packet)
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub packet: PacketRecord,
    /// Packets of the batch still waiting for a report.
    pub remaining: usize,
    /// Set once the batch is complete.
    pub next: Option<String>,
}

#[instrument(skip_all, fields(product_id = %product_id, batch_id = %batch_id, packet_no = %packet_no))]
pub async fn attach_report(
    pool: &Pool,
    product_id: &str,
    batch_id: &str,
    packet_no: &str,
    report: &str,
) -> Result<ReportOutcome, AppError> {
    if packet_no.trim().is_empty() || report.trim().is_empty() {
        return Err(Rejection::MissingFields.into());
    }

    let packets = db::list_packets(pool, batch_id, false)
        .await
        .map_err(|e| AppError::internal("Failed to fetch packets", e))?;
    let packet = check_report(&packets, packet_no, report)?;

    let updated = db::set_packet_report(pool, &packet.id, report.trim())
        .await
        .map_err(|e| AppError::internal("Error adding refractometer report. Please try again.", e))?
        .ok_or(Rejection::AlreadyReported)?;

    let remaining = packets
        .iter()
        .filter(|p| p.id != updated.id && !p.has_report())
        .count();
    info!(serial_no = %updated.serial_no, remaining, "refractometer report added");

    Ok(ReportOutcome {
        next: (remaining == 0).then(|| batch_details_path(product_id, batch_id)),
        packet: updated,
        remaining,
    })
}
