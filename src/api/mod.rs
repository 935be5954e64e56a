//! HTTP surface: public auth endpoints, admin CRUD, customer pages.

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::Pool;
use crate::guard;
use crate::identity::IdentityProvider;

pub mod admin;
pub mod auth;
pub mod customer;
pub mod extract;
pub mod pages;

#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub identity: Arc<dyn IdentityProvider>,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(pool: Pool, identity: Arc<dyn IdentityProvider>, secure_cookies: bool) -> Self {
        Self {
            pool,
            identity,
            secure_cookies,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/login", get(pages::login))
        .route("/unauthorized", get(pages::unauthorized))
        .route("/api/verify-token", get(auth::verify_token))
        .route("/api/create-user", post(auth::create_user))
        .route("/api/get-user", get(auth::get_user))
        .route("/api/login", post(auth::login))
        .route("/api/send-otp", post(auth::send_otp))
        .route("/api/verify-otp", post(auth::verify_otp))
        .route("/api/logout", post(auth::logout))
        .route("/admin", get(admin::dashboard))
        .nest("/admin/api", admin::routes())
        .route("/customer", get(customer::profile))
        .route("/customer/packets/{serial_no}", get(customer::verify_packet))
        .layer(from_fn_with_state(state.clone(), guard::route_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
