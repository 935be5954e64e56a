mod common;

use axum::http::StatusCode;
use common::{admin_auth, call, TestApp};
use k2k_portal::report::{ALREADY_REPORTED, MISSING_FIELDS, UNKNOWN_PACKET};
use serde_json::{json, Value};

async fn create_product(app: &TestApp, product_no: &str) -> Value {
    let resp = call(
        &app.router,
        "POST",
        "/admin/api/products",
        &[admin_auth()],
        Some(json!({ "product_no": product_no, "name": "Alphonso Mango", "details": "Ratnagiri" })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.json);
    resp.json
}

async fn create_batch(app: &TestApp, product_id: &str, batch_no: &str, packet_count: u32) -> Value {
    let resp = call(
        &app.router,
        "POST",
        &format!("/admin/api/products/{product_id}/batches"),
        &[admin_auth()],
        Some(json!({ "batch_no": batch_no, "packet_count": packet_count })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.json);
    resp.json
}

async fn report(app: &TestApp, product_id: &str, batch_id: &str, body: Value) -> common::Resp {
    call(
        &app.router,
        "POST",
        &format!("/admin/api/products/{product_id}/batches/{batch_id}/report"),
        &[admin_auth()],
        Some(body),
    )
    .await
}

#[tokio::test]
async fn requires_admin_session() {
    let app = common::app().await;
    let resp = call(&app.router, "GET", "/admin", &[], None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = call(
        &app.router,
        "GET",
        "/admin/api/products",
        &[("authorization", "Bearer customer-token")],
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = call(
        &app.router,
        "GET",
        "/admin/api/products",
        &[("cookie", "token=bogus")],
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dashboard_shows_admin_and_products() {
    let app = common::app().await;
    create_product(&app, "MNG").await;
    let resp = call(&app.router, "GET", "/admin", &[("cookie", "token=admin-token")], None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["user"]["name"], "Admin");
    assert_eq!(resp.json["user"]["role"], "admin");
    assert_eq!(resp.json["products"][0]["product_no"], "MNG");
}

#[tokio::test]
async fn product_crud() {
    let app = common::app().await;
    let product = create_product(&app, "MNG").await;
    let id = product["id"].as_str().unwrap();

    let resp = call(&app.router, "GET", &format!("/admin/api/products/{id}"), &[admin_auth()], None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["name"], "Alphonso Mango");

    let resp = call(&app.router, "GET", "/admin/api/products", &[admin_auth()], None).await;
    assert_eq!(resp.json.as_array().unwrap().len(), 1);

    let resp = call(
        &app.router,
        "POST",
        "/admin/api/products",
        &[admin_auth()],
        Some(json!({ "product_no": "MNG", "name": "Duplicate" })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = call(
        &app.router,
        "POST",
        "/admin/api/products",
        &[admin_auth()],
        Some(json!({ "product_no": "HNY" })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = call(&app.router, "GET", "/admin/api/products/missing", &[admin_auth()], None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_generates_serials() {
    let app = common::app().await;
    let product = create_product(&app, "MNG").await;
    let pid = product["id"].as_str().unwrap();

    let created = create_batch(&app, pid, "B07", 3).await;
    let serials: Vec<&str> = created["packets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["serial_no"].as_str().unwrap())
        .collect();
    assert_eq!(serials, vec!["MNGB07001", "MNGB07002", "MNGB07003"]);

    let resp = call(
        &app.router,
        "POST",
        &format!("/admin/api/products/{pid}/batches"),
        &[admin_auth()],
        Some(json!({ "batch_no": "B07", "packet_count": 1 })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = call(
        &app.router,
        "POST",
        &format!("/admin/api/products/{pid}/batches"),
        &[admin_auth()],
        Some(json!({ "batch_no": "B08", "packet_count": 10_001 })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let resp = call(
        &app.router,
        "GET",
        &format!("/admin/api/products/{pid}/batches"),
        &[admin_auth()],
        None,
    )
    .await;
    assert_eq!(resp.json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn colliding_serials_are_reported_as_such() {
    let app = common::app().await;
    let product = create_product(&app, "MNG").await;
    let pid = product["id"].as_str().unwrap();

    // B10 + 0010 and B100 + 010 both make MNGB100010.
    create_batch(&app, pid, "B10", 1000).await;
    let resp = call(
        &app.router,
        "POST",
        &format!("/admin/api/products/{pid}/batches"),
        &[admin_auth()],
        Some(json!({ "batch_no": "B100", "packet_count": 10 })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    let error = resp.json["error"].as_str().unwrap();
    assert!(error.starts_with("Serial number already exists"), "{error}");

    let resp = call(
        &app.router,
        "GET",
        &format!("/admin/api/products/{pid}/batches"),
        &[admin_auth()],
        None,
    )
    .await;
    assert_eq!(resp.json.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_batch_body_gets_json_error() {
    let app = common::app().await;
    let product = create_product(&app, "MNG").await;
    let pid = product["id"].as_str().unwrap();
    let resp = call(
        &app.router,
        "POST",
        &format!("/admin/api/products/{pid}/batches"),
        &[admin_auth()],
        Some(json!({ "batch_no": "B1", "packet_count": -1 })),
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json["error"].as_str().unwrap().contains("packet_count"));

    let resp = call(
        &app.router,
        "GET",
        &format!("/admin/api/products/{pid}/batches/x/packets?pending=maybe"),
        &[admin_auth()],
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json["error"].is_string());
}

#[tokio::test]
async fn add_packet_to_batch() {
    let app = common::app().await;
    let product = create_product(&app, "MNG").await;
    let pid = product["id"].as_str().unwrap();
    let batch = create_batch(&app, pid, "B1", 0).await;
    let bid = batch["batch"]["id"].as_str().unwrap();
    let uri = format!("/admin/api/products/{pid}/batches/{bid}/packets");

    let resp = call(&app.router, "POST", &uri, &[admin_auth()], Some(json!({ "packet_no": "042" }))).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json["serial_no"], "MNGB1042");

    let resp = call(&app.router, "POST", &uri, &[admin_auth()], Some(json!({ "packet_no": "042" }))).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.json["error"], "Serial number already exists");

    let resp = call(&app.router, "GET", &uri, &[admin_auth()], None).await;
    assert_eq!(resp.json["product_no"], "MNG");
    assert_eq!(resp.json["batch_no"], "B1");
    assert_eq!(resp.json["packets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn report_flow_until_batch_complete() {
    let app = common::app().await;
    let product = create_product(&app, "MNG").await;
    let pid = product["id"].as_str().unwrap();
    let batch = create_batch(&app, pid, "B1", 2).await;
    let bid = batch["batch"]["id"].as_str().unwrap();

    let resp = report(&app, pid, bid, json!({ "packet_no": "001", "report": "14.2 Brix" })).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["packet"]["serial_no"], "MNGB1001");
    assert_eq!(resp.json["packet"]["refractometer_report"], "14.2 Brix");
    assert_eq!(resp.json["remaining"], 1);
    assert!(resp.json["next"].is_null());

    let pending = call(
        &app.router,
        "GET",
        &format!("/admin/api/products/{pid}/batches/{bid}/packets?pending=true"),
        &[admin_auth()],
        None,
    )
    .await;
    let pending: Vec<&str> = pending.json["packets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["packet_no"].as_str().unwrap())
        .collect();
    assert_eq!(pending, vec!["002"]);

    let resp = report(&app, pid, bid, json!({ "packet_no": "002", "report": "13.9 Brix" })).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["remaining"], 0);
    assert_eq!(
        resp.json["next"],
        format!("/admin/{pid}/{bid}/batch_details")
    );
}

#[tokio::test]
async fn report_rejections() {
    let app = common::app().await;
    let product = create_product(&app, "MNG").await;
    let pid = product["id"].as_str().unwrap();
    let batch = create_batch(&app, pid, "B1", 12).await;
    let bid = batch["batch"]["id"].as_str().unwrap();

    let resp = report(&app, pid, bid, json!({ "packet_no": "001" })).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json["error"], MISSING_FIELDS);

    // Prefix of a real suffix must not match.
    let resp = report(&app, pid, bid, json!({ "packet_no": "01", "report": "12" })).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.json["error"], UNKNOWN_PACKET);

    let resp = report(&app, pid, bid, json!({ "packet_no": "011", "report": "12" })).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["packet"]["serial_no"], "MNGB1011");

    let resp = report(&app, pid, bid, json!({ "packet_no": "011", "report": "13" })).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.json["error"], ALREADY_REPORTED);

    let resp = report(&app, pid, "no-such-batch", json!({ "packet_no": "001", "report": "1" })).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn customer_verifies_reported_packet() {
    let app = common::app().await;
    let product = create_product(&app, "MNG").await;
    let pid = product["id"].as_str().unwrap();
    let batch = create_batch(&app, pid, "B1", 1).await;
    let bid = batch["batch"]["id"].as_str().unwrap();
    report(&app, pid, bid, json!({ "packet_no": "001", "report": "15.0 Brix" })).await;

    let resp = call(
        &app.router,
        "GET",
        "/customer/packets/MNGB1001?token=customer-token",
        &[],
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json["authentic"], true);
    assert_eq!(resp.json["product"]["name"], "Alphonso Mango");
    assert_eq!(resp.json["batch"]["batch_no"], "B1");
    assert_eq!(resp.json["packet"]["refractometer_report"], "15.0 Brix");

    let resp = call(
        &app.router,
        "GET",
        "/customer/packets/MNGB1999",
        &[("cookie", "token=customer-token")],
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
