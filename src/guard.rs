//! Route guard in front of every request.
//!
//! `/admin/...` passes through; the admin endpoints check the session
//! themselves. `/customer/...` needs an ID token from the `token` query
//! parameter or cookie that the identity provider accepts, otherwise the
//! caller is sent to `/login`. Accepted tokens are written back as the
//! session cookie.

use axum::extract::{Query, Request, State};
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::identity::IdentityProvider;
use crate::session::{cookie_value, session_cookie, VerifiedSession, SESSION_COOKIE};

pub const ADMIN_PREFIX: &str = "/admin";
pub const CUSTOMER_PREFIX: &str = "/customer";
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Area {
    Admin,
    Customer,
    Open,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Continue,
    /// Continue, then persist the verified token as the session cookie.
    ContinueWithCookie(VerifiedSession),
    RedirectToLogin,
}

fn under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub fn area(path: &str) -> Area {
    if under(path, ADMIN_PREFIX) {
        Area::Admin
    } else if under(path, CUSTOMER_PREFIX) {
        Area::Customer
    } else {
        Area::Open
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Query-string token first, then the session cookie.
pub fn request_token(req: &Request) -> Option<String> {
    let from_query = Query::<TokenQuery>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.trim().is_empty());
    from_query.or_else(|| cookie_value(req.headers(), SESSION_COOKIE).map(str::to_string))
}

pub async fn decide(identity: &dyn IdentityProvider, path: &str, token: Option<String>) -> Decision {
    match area(path) {
        Area::Admin | Area::Open => Decision::Continue,
        Area::Customer => {
            let Some(token) = token else {
                debug!(path, "no customer token");
                return Decision::RedirectToLogin;
            };
            match identity.verify_id_token(&token).await {
                Ok(claims) => {
                    debug!(path, uid = %claims.uid, "customer token accepted");
                    Decision::ContinueWithCookie(VerifiedSession { token, claims })
                }
                Err(err) => {
                    info!(path, error = %err, "customer token rejected");
                    Decision::RedirectToLogin
                }
            }
        }
    }
}

pub async fn route_guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let token = request_token(&req);

    match decide(state.identity.as_ref(), &path, token).await {
        Decision::Continue => next.run(req).await,
        Decision::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
        Decision::ContinueWithCookie(verified) => {
            let cookie = session_cookie(&verified.token, state.secure_cookies);
            // Handlers reuse the verification instead of calling the provider again.
            req.extensions_mut().insert(verified);
            let mut response = next.run(req).await;
            match HeaderValue::from_str(&cookie) {
                Ok(cookie) => {
                    response.headers_mut().append(SET_COOKIE, cookie);
                }
                Err(err) => warn!(?err, "token is not a valid cookie value"),
            }
            response
        }
    }
}
