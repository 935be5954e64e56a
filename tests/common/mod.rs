#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

use k2k_portal::api::{self, AppState};
use k2k_portal::db::{self, NewUser, Pool};
use k2k_portal::identity::{IdentityError, IdentityProvider, SignIn, VerifiedToken};
use k2k_portal::model::Role;

pub const ADMIN_TOKEN: &str = "admin-token";
pub const CUSTOMER_TOKEN: &str = "customer-token";
pub const OTP_SESSION: &str = "otp-session";
pub const OTP_CODE: &str = "123456";

pub async fn setup_pool() -> Pool {
    let pool = db::init_pool("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

fn claims(uid: &str) -> VerifiedToken {
    VerifiedToken {
        uid: uid.to_string(),
        email: None,
        email_verified: false,
        phone_number: None,
        display_name: None,
    }
}

fn sign_in(uid: &str, token: &str, phone: Option<&str>) -> SignIn {
    SignIn {
        uid: uid.to_string(),
        id_token: token.to_string(),
        refresh_token: format!("refresh-{uid}"),
        expires_in: 3600,
        email: None,
        phone_number: phone.map(str::to_string),
        display_name: None,
    }
}

/// Identity provider stand-in that knows a fixed set of tokens and records lookups.
#[derive(Clone, Default)]
pub struct RecordingIdentity {
    tokens: Arc<Mutex<HashMap<String, VerifiedToken>>>,
    verify_calls: Arc<Mutex<Vec<String>>>,
    unreachable: bool,
}

impl RecordingIdentity {
    pub fn new() -> Self {
        let mut tokens = HashMap::new();
        let mut admin = claims("admin-1");
        admin.email = Some("admin@k2k.test".into());
        admin.email_verified = true;
        tokens.insert(ADMIN_TOKEN.to_string(), admin);
        let mut customer = claims("cust-1");
        customer.phone_number = Some("+919876543210".into());
        tokens.insert(CUSTOMER_TOKEN.to_string(), customer);
        Self {
            tokens: Arc::new(Mutex::new(tokens)),
            ..Default::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    pub async fn verify_calls(&self) -> Vec<String> {
        self.verify_calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl IdentityProvider for RecordingIdentity {
    async fn verify_id_token(&self, id_token: &str) -> Result<VerifiedToken, IdentityError> {
        self.verify_calls.lock().await.push(id_token.to_string());
        if self.unreachable {
            return Err(IdentityError::Malformed("connection reset".into()));
        }
        self.tokens
            .lock()
            .await
            .get(id_token)
            .cloned()
            .ok_or_else(|| IdentityError::Rejected("INVALID_ID_TOKEN".into()))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignIn, IdentityError> {
        if email == "admin@k2k.test" && password == "hunter2" {
            Ok(sign_in("admin-1", ADMIN_TOKEN, None))
        } else {
            Err(IdentityError::Rejected("INVALID_LOGIN_CREDENTIALS".into()))
        }
    }

    async fn send_verification_code(
        &self,
        _phone_number: &str,
        _recaptcha_token: &str,
    ) -> Result<String, IdentityError> {
        Ok(OTP_SESSION.to_string())
    }

    async fn sign_in_with_phone(
        &self,
        session_info: &str,
        code: &str,
    ) -> Result<SignIn, IdentityError> {
        if session_info == OTP_SESSION && code == OTP_CODE {
            Ok(sign_in("cust-1", CUSTOMER_TOKEN, Some("+919876543210")))
        } else {
            Err(IdentityError::Rejected("INVALID_CODE".into()))
        }
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub pool: Pool,
    pub identity: RecordingIdentity,
}

pub async fn app_with(identity: RecordingIdentity) -> TestApp {
    let pool = setup_pool().await;
    db::upsert_user(
        &pool,
        &NewUser {
            uid: "admin-1",
            name: Some("Admin"),
            role: Some(Role::Admin),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let state = AppState::new(pool.clone(), Arc::new(identity.clone()), false);
    TestApp {
        router: api::router(state),
        pool,
        identity,
    }
}

pub async fn app() -> TestApp {
    app_with(RecordingIdentity::new()).await
}

pub struct Resp {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: serde_json::Value,
}

impl Resp {
    pub fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get("location").and_then(|v| v.to_str().ok())
    }
}

pub async fn call(
    router: &axum::Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<serde_json::Value>,
) -> Resp {
    let builder = request(method, uri, headers);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&v).unwrap())),
        None => builder.body(Body::empty()),
    };
    send(router, request.unwrap()).await
}

/// Send `raw` verbatim as a JSON-typed body.
pub async fn call_raw(
    router: &axum::Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    raw: &str,
) -> Resp {
    let request = request(method, uri, headers)
        .header("content-type", "application/json")
        .body(Body::from(raw.to_string()))
        .unwrap();
    send(router, request).await
}

fn request(method: &str, uri: &str, headers: &[(&str, &str)]) -> axum::http::request::Builder {
    let mut builder = Request::builder().method(method).uri(uri);
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder
}

async fn send(router: &axum::Router, request: Request<Body>) -> Resp {
    let resp = router.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::json!(null)
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::json!(null))
    };
    Resp {
        status,
        headers,
        json,
    }
}

pub fn admin_auth() -> (&'static str, &'static str) {
    ("authorization", "Bearer admin-token")
}

pub fn customer_auth() -> (&'static str, &'static str) {
    ("authorization", "Bearer customer-token")
}
