use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::admin::AdminState;
use crate::health::HealthCheckStats;
use crate::load_balancer::BalancerStats;
use crate::resilience::CircuitState;

#[derive(Serialize)]
pub struct InstanceState {
    pub id: String,
    pub state: CircuitState,
}

#[derive(Serialize)]
pub struct Availability {
    pub available: usize,
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<BalancerStats> {
    Json(state.balancer.get_stats())
}

pub async fn get_health(
    State(state): State<AdminState>,
) -> Result<Json<HealthCheckStats>, StatusCode> {
    let checker = state.balancer.health_checker().map_err(|e| {
        tracing::error!(error = %e, "Health checker unavailable");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(checker.get_health_check_stats()))
}

pub async fn get_available(State(state): State<AdminState>) -> Json<Availability> {
    Json(Availability {
        available: state.balancer.get_available_instance_count(),
    })
}

pub async fn get_instance_state(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Json<InstanceState> {
    let circuit = state.balancer.get_circuit_breaker_state(&id);
    Json(InstanceState { id, state: circuit })
}
