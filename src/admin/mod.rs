//! Admin API.
//!
//! Read-only views of the balancer for dashboards and `balancer-cli`.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::load_balancer::LoadBalancer;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub balancer: Arc<LoadBalancer>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(balancer: Arc<LoadBalancer>, api_key: impl Into<Arc<str>>) -> Self {
        Self {
            balancer,
            api_key: api_key.into(),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/stats", get(get_stats))
        .route("/admin/health", get(get_health))
        .route("/admin/available", get(get_available))
        .route("/admin/instances/{id}/state", get(get_instance_state))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
