use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;

use super::extract::AppQuery;
use crate::error::AppError;
use crate::guard::CUSTOMER_PREFIX;

pub async fn home() -> Json<serde_json::Value> {
    Json(json!({
        "name": "Kishan2Kitchen Traceability Portal",
        "links": { "customer": "/customer", "admin": "/admin" },
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    token: Option<String>,
}

/// Relative `/customer?token=...` link with the token query-encoded.
fn customer_link(token: &str) -> anyhow::Result<String> {
    let target = Url::parse_with_params(
        &format!("http://portal.invalid{CUSTOMER_PREFIX}"),
        [("token", token)],
    )?;
    Ok(format!("{}?{}", target.path(), target.query().unwrap_or_default()))
}

/// A deep link carrying a token skips the login forms.
pub async fn login(AppQuery(params): AppQuery<LoginParams>) -> Response {
    if let Some(token) = params.token.as_deref().filter(|t| !t.trim().is_empty()) {
        return match customer_link(token) {
            Ok(location) => Redirect::to(&location).into_response(),
            Err(err) => AppError::internal("Failed to build redirect", err).into_response(),
        };
    }

    Json(json!({
        "admin": {
            "hint": "Use email and password to access admin panel",
            "endpoint": "/api/login",
        },
        "customer": {
            "hint": "Use phone number and OTP to verify products",
            "send_otp": "/api/send-otp",
            "verify_otp": "/api/verify-otp",
        },
    }))
    .into_response()
}

pub async fn unauthorized() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "Access Denied",
            "details": "You don't have permission to access this page. Please contact your administrator for access.",
        })),
    )
        .into_response()
}
