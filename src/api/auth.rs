//! Public auth endpoints: token verification, user records, sign-in flows.

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use super::extract::{AppJson, AppQuery};
use super::AppState;
use crate::db::{self, NewUser, UserRecord};
use crate::error::AppError;
use crate::identity::SignIn;
use crate::model::Role;
use crate::session::{expired_session_cookie, session_cookie, Session};

static E164: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("valid regex"));

fn present(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    token: Option<String>,
}

#[instrument(skip_all)]
pub async fn verify_token(State(state): State<AppState>, AppQuery(params): AppQuery<TokenParams>) -> Response {
    let Some(token) = present(&params.token) else {
        return AppError::BadRequest("No token provided".into()).into_response();
    };

    match state.identity.verify_id_token(token).await {
        Ok(claims) => Json(json!({
            "valid": true,
            "user": {
                "uid": claims.uid,
                "email": claims.email,
                "email_verified": claims.email_verified,
            }
        }))
        .into_response(),
        Err(err) => {
            warn!(error = %err, "token verification failed");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Invalid token", "details": err.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateUserReq {
    uid: Option<String>,
    name: Option<String>,
    email: Option<String>,
    phone_number: Option<String>,
    role: Option<Role>,
}

/// Create or merge a user record. Callers write their own record; only an
/// admin may write another user's record or set a role.
#[instrument(skip_all)]
pub async fn create_user(
    session: Session,
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateUserReq>,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = present(&body.uid).ok_or_else(|| AppError::BadRequest("UID is required".into()))?;

    if session.role() != Role::Admin {
        if uid != session.claims.uid {
            warn!(caller = %session.claims.uid, uid, "refused write to another user's record");
            return Err(AppError::Forbidden);
        }
        if body.role.is_some() {
            warn!(caller = %session.claims.uid, "refused role change from non-admin");
            return Err(AppError::Forbidden);
        }
    }

    let user = db::upsert_user(
        &state.pool,
        &NewUser {
            uid,
            name: present(&body.name),
            email: present(&body.email),
            phone_number: present(&body.phone_number),
            role: body.role,
        },
    )
    .await
    .map_err(|e| AppError::internal("Failed to create user", e))?;

    info!(by = %session.claims.uid, uid = %user.uid, role = %user.role, "user record saved");
    Ok(Json(json!({
        "success": true,
        "message": "User created successfully",
        "user": user,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UidParams {
    uid: Option<String>,
}

#[instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<UidParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let uid = present(&params.uid).ok_or_else(|| AppError::BadRequest("No UID provided".into()))?;

    let user = db::get_user(&state.pool, uid)
        .await
        .map_err(|e| AppError::internal("Failed to fetch user details", e))?
        .unwrap_or_else(|| {
            warn!(uid, "user record not found; returning fallback");
            UserRecord::fallback(uid)
        });

    Ok(Json(json!({ "success": true, "user": user })))
}

fn signed_in(state: &AppState, sign_in: SignIn, user: UserRecord) -> Response {
    let cookie = session_cookie(&sign_in.id_token, state.secure_cookies);
    (
        [(SET_COOKIE, cookie)],
        Json(json!({
            "uid": sign_in.uid,
            "id_token": sign_in.id_token,
            "refresh_token": sign_in.refresh_token,
            "expires_in": sign_in.expires_in,
            "user": user,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct LoginReq {
    email: Option<String>,
    password: Option<String>,
}

/// Admin email/password sign-in. The role comes from the stored record, never the request.
#[instrument(skip_all)]
pub async fn login(State(state): State<AppState>, AppJson(body): AppJson<LoginReq>) -> Result<Response, AppError> {
    let (Some(email), Some(password)) = (present(&body.email), body.password.as_deref().filter(|p| !p.is_empty())) else {
        return Err(AppError::BadRequest("Please fill in all fields".into()));
    };

    let sign_in = state
        .identity
        .sign_in_with_password(email, password)
        .await
        .map_err(|e| AppError::identity(e, AppError::Unauthorized))?;

    let user = db::get_user(&state.pool, &sign_in.uid)
        .await
        .map_err(|e| AppError::internal("Failed to fetch user details", e))?
        .unwrap_or_else(|| UserRecord::fallback(&sign_in.uid));

    info!(uid = %sign_in.uid, role = %user.role, "password sign-in");
    Ok(signed_in(&state, sign_in, user))
}

#[derive(Debug, Deserialize)]
pub struct SendOtpReq {
    phone_number: Option<String>,
    recaptcha_token: Option<String>,
}

#[instrument(skip_all)]
pub async fn send_otp(
    State(state): State<AppState>,
    AppJson(body): AppJson<SendOtpReq>,
) -> Result<Json<serde_json::Value>, AppError> {
    let phone = present(&body.phone_number)
        .ok_or_else(|| AppError::BadRequest("Please enter your phone number".into()))?;
    if !E164.is_match(phone) {
        return Err(AppError::BadRequest(
            "Phone number must be in international format, e.g. +1234567890".into(),
        ));
    }
    let recaptcha = present(&body.recaptcha_token)
        .ok_or_else(|| AppError::BadRequest("reCAPTCHA token is required".into()))?;

    let session_info = state
        .identity
        .send_verification_code(phone, recaptcha)
        .await
        .map_err(|e| AppError::identity(e, AppError::BadRequest))?;

    info!("OTP sent");
    Ok(Json(json!({ "session_info": session_info })))
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpReq {
    session_info: Option<String>,
    code: Option<String>,
}

/// Customer phone sign-in. Creates the customer record on first login.
#[instrument(skip_all)]
pub async fn verify_otp(
    State(state): State<AppState>,
    AppJson(body): AppJson<VerifyOtpReq>,
) -> Result<Response, AppError> {
    let code = present(&body.code).ok_or_else(|| AppError::BadRequest("Please enter the OTP".into()))?;
    let session_info = present(&body.session_info)
        .ok_or_else(|| AppError::BadRequest("No confirmation result available".into()))?;

    let sign_in = state
        .identity
        .sign_in_with_phone(session_info, code)
        .await
        .map_err(|e| AppError::identity(e, AppError::Unauthorized))?;

    let user = db::upsert_user(
        &state.pool,
        &NewUser {
            uid: &sign_in.uid,
            name: sign_in.display_name.as_deref(),
            phone_number: sign_in.phone_number.as_deref(),
            ..Default::default()
        },
    )
    .await
    .map_err(|e| AppError::internal("Failed to create user", e))?;

    info!(uid = %user.uid, "phone sign-in");
    Ok(signed_in(&state, sign_in, user))
}

pub async fn logout(State(state): State<AppState>) -> Response {
    (
        [(SET_COOKIE, expired_session_cookie(state.secure_cookies))],
        Json(json!({ "success": true })),
    )
        .into_response()
}
