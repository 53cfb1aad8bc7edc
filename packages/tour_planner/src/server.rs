//! HTTP surface of the planner. Requests are converted into
//! PlanTourParameters, passed to the TourPlanner and the result (or error)
//! is returned as JSON.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::common::params::{PlanTourParameters, UserPlanTourParameters};
use crate::common::tour::PlannedTour;
use crate::error::PlanningError;
use crate::routing::external::DirectionsService;
use crate::routing::planner::TourPlanner;

pub struct AppState<D> {
    planner: Arc<TourPlanner<D>>,
}

impl<D> Clone for AppState<D> {
    fn clone(&self) -> Self {
        AppState {
            planner: Arc::clone(&self.planner),
        }
    }
}

/// Status code returned to the caller for each kind of planning failure
pub fn status_for(err: &PlanningError) -> StatusCode {
    match err {
        PlanningError::InvalidParameters(_) | PlanningError::UnknownNode(_) => {
            StatusCode::BAD_REQUEST
        }
        PlanningError::NoPath { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        PlanningError::RoutingService(_) => StatusCode::BAD_GATEWAY,
        PlanningError::GraphUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        PlanningError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    let body = json!({
        "status": "error",
        "message": message
    });
    (status, Json(body)).into_response()
}

impl IntoResponse for PlanningError {
    fn into_response(self) -> Response {
        error_response(status_for(&self), self.to_string())
    }
}

/// Validate the body and run the planner, shared by both plan endpoints
async fn run_planner<D: DirectionsService>(
    state: &AppState<D>,
    body: Result<Json<UserPlanTourParameters>, JsonRejection>,
) -> Result<PlannedTour, Response> {
    let now = Instant::now();

    let Json(user_params) = body.map_err(|rejection| {
        error_response(StatusCode::BAD_REQUEST, rejection.body_text())
    })?;

    let params = PlanTourParameters::try_from(user_params)
        .map_err(IntoResponse::into_response)?;

    match state.planner.plan_tour(&params).await {
        Ok(tour) => {
            info!(
                "Planned {} waypoints in {:.2?}",
                params.waypoint_ids.len(),
                now.elapsed()
            );
            Ok(tour)
        }
        Err(err) => {
            warn!("Planning failed after {:.2?}: {err}", now.elapsed());
            Err(err.into_response())
        }
    }
}

async fn plan_tour<D: DirectionsService>(
    State(state): State<AppState<D>>,
    body: Result<Json<UserPlanTourParameters>, JsonRejection>,
) -> Response {
    match run_planner(&state, body).await {
        Ok(tour) => (StatusCode::OK, Json(tour)).into_response(),
        Err(response) => response,
    }
}

/// Same as plan_tour, but the track is returned as a GeoJSON feature
/// collection with one line per leg
async fn plan_tour_geojson<D: DirectionsService>(
    State(state): State<AppState<D>>,
    body: Result<Json<UserPlanTourParameters>, JsonRejection>,
) -> Response {
    match run_planner(&state, body).await {
        Ok(tour) => (StatusCode::OK, Json(tour.to_geojson())).into_response(),
        Err(response) => response,
    }
}

async fn health_check() -> impl IntoResponse {
    let msg = "Tour planner is running";

    let json_response = json!({
        "status": "success",
        "message": msg
    });

    Json(json_response)
}

pub fn router<D>(planner: TourPlanner<D>) -> Router
where
    D: DirectionsService + 'static,
{
    let state = AppState {
        planner: Arc::new(planner),
    };

    Router::new()
        .route("/healthcheck", get(health_check))
        .route("/tour/plan", post(plan_tour::<D>))
        .route("/tour/plan/geojson", post(plan_tour_geojson::<D>))
        .with_state(state)
}
