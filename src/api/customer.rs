//! Customer pages. The route guard has already accepted the token by the
//! time these run.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::{info, instrument};

use super::AppState;
use crate::db;
use crate::error::AppError;
use crate::session::{display_name, Session};

pub async fn profile(session: Session) -> Json<Value> {
    Json(json!({
        "uid": session.claims.uid,
        "name": display_name(&session.profile, &session.claims),
        "email": session.claims.email.clone().or(session.profile.email.clone()),
        "email_verified": session.claims.email_verified,
        "phone_number": session.claims.phone_number.clone().or(session.profile.phone_number.clone()),
        "role": session.role(),
    }))
}

/// Authenticity check for a serial number printed on a packet.
#[instrument(skip_all, fields(serial_no = %serial_no))]
pub async fn verify_packet(
    session: Session,
    State(state): State<AppState>,
    Path(serial_no): Path<String>,
) -> Result<Json<Value>, AppError> {
    let not_found = || AppError::NotFound("Packet not found. This product could not be verified.".into());

    let packet = db::find_packet_by_serial(&state.pool, serial_no.trim())
        .await
        .map_err(|e| AppError::internal("Failed to look up packet", e))?
        .ok_or_else(not_found)?;
    let product = db::get_product(&state.pool, &packet.product_id)
        .await
        .map_err(|e| AppError::internal("Failed to look up product", e))?
        .ok_or_else(not_found)?;
    let batch = db::get_batch(&state.pool, &packet.product_id, &packet.batch_id)
        .await
        .map_err(|e| AppError::internal("Failed to look up batch", e))?
        .ok_or_else(not_found)?;

    info!(uid = %session.claims.uid, "packet verified");
    Ok(Json(json!({
        "authentic": true,
        "serial_no": packet.serial_no,
        "product": {
            "product_no": product.product_no,
            "name": product.name,
            "details": product.details,
            "image_url": product.image_url,
        },
        "batch": {
            "batch_no": batch.batch_no,
            "created_at": batch.created_at,
        },
        "packet": {
            "packet_no": packet.packet_no,
            "refractometer_report": packet.refractometer_report,
            "reported_at": packet.reported_at,
        },
    })))
}
