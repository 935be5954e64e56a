//! Admin endpoints for products, batches, packets and refractometer reports.
//!
//! The route guard lets `/admin` through; every handler here takes an
//! [`AdminSession`], so callers without an admin record get 401/403.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::extract::{AppJson, AppQuery};
use super::AppState;
use crate::db::{self, BatchRecord, ProductRecord};
use crate::error::AppError;
use crate::report::{self, ReportOutcome};
use crate::session::{display_name, AdminSession};

/// Upper bound on packets generated with one batch.
pub const MAX_PACKETS_PER_BATCH: u32 = 10_000;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/{product_id}", get(get_product))
        .route(
            "/products/{product_id}/batches",
            get(list_batches).post(create_batch),
        )
        .route(
            "/products/{product_id}/batches/{batch_id}/packets",
            get(list_packets).post(add_packet),
        )
        .route(
            "/products/{product_id}/batches/{batch_id}/report",
            post(add_report),
        )
}

fn required<'a>(v: &'a Option<String>, message: &str) -> Result<&'a str, AppError> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest(message.to_string()))
}

fn optional(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

async fn load_product(state: &AppState, product_id: &str) -> Result<ProductRecord, AppError> {
    db::get_product(&state.pool, product_id)
        .await
        .map_err(|e| AppError::internal("Failed to fetch product", e))?
        .ok_or_else(|| AppError::NotFound("Product not found".into()))
}

async fn load_batch(
    state: &AppState,
    product_id: &str,
    batch_id: &str,
) -> Result<(ProductRecord, BatchRecord), AppError> {
    let product = load_product(state, product_id).await?;
    let batch = db::get_batch(&state.pool, product_id, batch_id)
        .await
        .map_err(|e| AppError::internal("Failed to fetch batch", e))?
        .ok_or_else(|| AppError::NotFound("Batch not found".into()))?;
    Ok((product, batch))
}

pub async fn dashboard(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let products = db::list_products(&state.pool)
        .await
        .map_err(|e| AppError::internal("Failed to fetch products", e))?;
    Ok(Json(json!({
        "user": {
            "uid": session.claims.uid,
            "name": display_name(&session.profile, &session.claims),
            "role": session.role(),
        },
        "products": products,
    })))
}

pub async fn list_products(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> Result<Json<Vec<ProductRecord>>, AppError> {
    let products = db::list_products(&state.pool)
        .await
        .map_err(|e| AppError::internal("Failed to fetch products", e))?;
    Ok(Json(products))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductReq {
    product_no: Option<String>,
    name: Option<String>,
    details: Option<String>,
    image_url: Option<String>,
}

pub async fn create_product(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateProductReq>,
) -> Result<(StatusCode, Json<ProductRecord>), AppError> {
    let product_no = required(&body.product_no, "Product number is required")?;
    let name = required(&body.name, "Product name is required")?;

    let product = db::insert_product(
        &state.pool,
        product_no,
        name,
        optional(&body.details),
        optional(&body.image_url),
    )
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict(format!("Product number {product_no} already exists"))
        } else {
            AppError::internal("Failed to add product", e)
        }
    })?;

    info!(by = %session.claims.uid, product_id = %product.id, product_no, "product added");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<ProductRecord>, AppError> {
    Ok(Json(load_product(&state, &product_id).await?))
}

pub async fn list_batches(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Vec<BatchRecord>>, AppError> {
    load_product(&state, &product_id).await?;
    let batches = db::list_batches(&state.pool, &product_id)
        .await
        .map_err(|e| AppError::internal("Failed to fetch batches", e))?;
    Ok(Json(batches))
}

#[derive(Debug, Deserialize)]
pub struct CreateBatchReq {
    batch_no: Option<String>,
    #[serde(default)]
    packet_count: u32,
}

pub async fn create_batch(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path(product_id): Path<String>,
    AppJson(body): AppJson<CreateBatchReq>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let batch_no = required(&body.batch_no, "Batch number is required")?;
    if body.packet_count > MAX_PACKETS_PER_BATCH {
        return Err(AppError::BadRequest(format!(
            "A batch holds at most {MAX_PACKETS_PER_BATCH} packets"
        )));
    }
    let product = load_product(&state, &product_id).await?;

    let (batch, packets) = db::insert_batch(&state.pool, &product, batch_no, body.packet_count)
        .await
        .map_err(|e| {
            if db::is_unique_violation_on(&e, "packets.serial_no") {
                AppError::Conflict(format!(
                    "Serial number already exists: packets of batch {batch_no} collide with another batch"
                ))
            } else if db::is_unique_violation(&e) {
                AppError::Conflict(format!("Batch {batch_no} already exists for this product"))
            } else {
                AppError::internal("Failed to create batch", e)
            }
        })?;

    info!(by = %session.claims.uid, batch_id = %batch.id, packets = packets.len(), "batch created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "batch": batch, "packets": packets })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PacketFilter {
    #[serde(default)]
    pending: bool,
}

pub async fn list_packets(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path((product_id, batch_id)): Path<(String, String)>,
    AppQuery(filter): AppQuery<PacketFilter>,
) -> Result<Json<Value>, AppError> {
    let (product, batch) = load_batch(&state, &product_id, &batch_id).await?;
    let packets = db::list_packets(&state.pool, &batch.id, filter.pending)
        .await
        .map_err(|e| AppError::internal("Failed to fetch packets", e))?;
    Ok(Json(json!({
        "product_no": product.product_no,
        "batch_no": batch.batch_no,
        "packets": packets,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AddPacketReq {
    packet_no: Option<String>,
}

pub async fn add_packet(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path((product_id, batch_id)): Path<(String, String)>,
    AppJson(body): AppJson<AddPacketReq>,
) -> Result<(StatusCode, Json<db::PacketRecord>), AppError> {
    let packet_no = required(&body.packet_no, "Packet number is required")?;
    let (product, batch) = load_batch(&state, &product_id, &batch_id).await?;

    let packet = db::insert_packet(&state.pool, &product, &batch, packet_no)
        .await
        .map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::Conflict("Serial number already exists".into())
            } else {
                AppError::internal("Error adding serial number. Please try again.", e)
            }
        })?;

    info!(by = %session.claims.uid, serial_no = %packet.serial_no, "serial number added");
    Ok((StatusCode::CREATED, Json(packet)))
}

#[derive(Debug, Deserialize)]
pub struct AddReportReq {
    packet_no: Option<String>,
    report: Option<String>,
}

pub async fn add_report(
    AdminSession(session): AdminSession,
    State(state): State<AppState>,
    Path((product_id, batch_id)): Path<(String, String)>,
    AppJson(body): AppJson<AddReportReq>,
) -> Result<Json<ReportOutcome>, AppError> {
    let (_, batch) = load_batch(&state, &product_id, &batch_id).await?;
    let outcome = report::attach_report(
        &state.pool,
        &product_id,
        &batch.id,
        body.packet_no.as_deref().unwrap_or_default(),
        body.report.as_deref().unwrap_or_default(),
    )
    .await?;
    info!(by = %session.claims.uid, serial_no = %outcome.packet.serial_no, "report attached");
    Ok(Json(outcome))
}
