//! Request-scoped session: who is calling, and with which role.
//!
//! The ID token comes from the `Authorization: Bearer` header or the
//! `token` cookie. It is verified by the identity provider once per request:
//! customer pages reuse what the route guard already accepted.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::db::{self, UserRecord};
use crate::error::AppError;
use crate::identity::VerifiedToken;
use crate::model::Role;

pub const SESSION_COOKIE: &str = "token";

/// Value of the cookie called `name`, if the request carries one.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `Set-Cookie` value persisting `token` as the http-only session cookie.
pub fn session_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn expired_session_cookie(secure: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Display name following the profile, then the token's claims.
pub fn display_name(profile: &UserRecord, claims: &VerifiedToken) -> String {
    if profile.name != "User" && !profile.name.trim().is_empty() {
        return profile.name.clone();
    }
    claims
        .display_name
        .clone()
        .or_else(|| claims.email.clone())
        .unwrap_or_else(|| "User".to_string())
}

/// Token already accepted by the route guard for this request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub token: String,
    pub claims: VerifiedToken,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub claims: VerifiedToken,
    /// Stored profile, or the customer fallback when the store has none.
    pub profile: UserRecord,
}

impl Session {
    pub fn role(&self) -> Role {
        self.profile.role
    }
}

async fn verify(parts: &Parts, state: &AppState) -> Result<VerifiedSession, AppError> {
    let token = bearer(&parts.headers)
        .or_else(|| cookie_value(&parts.headers, SESSION_COOKIE))
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?
        .to_string();

    let claims = state.identity.verify_id_token(&token).await.map_err(|e| {
        warn!(error = %e, "session token rejected");
        AppError::identity(e, |_| AppError::Unauthorized("Invalid token".into()))
    })?;
    Ok(VerifiedSession { token, claims })
}

impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let VerifiedSession { token, claims } = match parts.extensions.get::<VerifiedSession>() {
            Some(verified) => verified.clone(),
            None => verify(parts, state).await?,
        };

        let profile = match db::get_user(&state.pool, &claims.uid).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                debug!(uid = %claims.uid, "no stored profile; using fallback");
                UserRecord::fallback(&claims.uid)
            }
            Err(err) => return Err(AppError::internal("Failed to fetch user details", err)),
        };

        Ok(Session {
            token,
            claims,
            profile,
        })
    }
}

/// A session whose stored role is `admin`.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Session);

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        if session.role() != Role::Admin {
            warn!(uid = %session.claims.uid, "non-admin reached admin endpoint");
            return Err(AppError::Forbidden);
        }
        Ok(AdminSession(session))
    }
}
