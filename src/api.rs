//! REST API for Maintenance Scheduling.
//!
//! Provides endpoints for:
//! - Reading the current schedule with its score and solver status
//! - Starting and stopping a solve
//! - Solve status with persistence diagnostics
//! - Score analysis per constraint
//! - Swagger UI at /q/swagger-ui

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::constraints::{analyze, ConstraintAnalysis, ScoreAnalysis};
use crate::dto::*;
use crate::error::SolveError;
use crate::solver::{SolveDiagnostics, SolveOutcomeKind, SolverService, SolverStatus};

/// Application state shared across handlers.
pub struct AppState {
    pub solver: Arc<SolverService>,
}

impl AppState {
    pub fn new(solver: Arc<SolverService>) -> Self {
        Self { solver }
    }
}

/// Creates the API router with CORS and Swagger UI enabled.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(info))
        // Schedule
        .route("/schedule", get(get_schedule))
        .route("/schedule/solve", post(solve))
        .route("/schedule/stopSolving", post(stop_solving))
        .route("/schedule/status", get(get_status))
        .route("/schedule/analyze", get(analyze_schedule))
        // Swagger UI at /q/swagger-ui (Quarkus-style path)
        .merge(SwaggerUi::new("/q/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Errors
// ============================================================================

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Error type for HTTP handlers.
#[derive(Debug)]
pub struct AppError(SolveError);

impl From<SolveError> for AppError {
    fn from(err: SolveError) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, code) = match self.0 {
            SolveError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            SolveError::AlreadySolving(_) => (StatusCode::CONFLICT, "ALREADY_SOLVING"),
            SolveError::InvalidState(_) => (StatusCode::BAD_REQUEST, "INVALID_STATE"),
            SolveError::PersistenceFailure(_) => {
                tracing::error!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILURE")
            }
            SolveError::Worker(_) => {
                tracing::error!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "WORKER_FAILURE")
            }
        };
        (status, Json(ApiError::new(code, message))).into_response()
    }
}

// ============================================================================
// Health & Info
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Status indicator ("UP" when healthy).
    pub status: &'static str,
}

/// GET /health - Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

/// Application info response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub solver_engine: &'static str,
    pub schedule_id: u64,
}

/// GET /info - Application info endpoint.
#[utoipa::path(
    get,
    path = "/info",
    responses((status = 200, description = "Application info", body = InfoResponse))
)]
async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Maintenance Scheduling",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: state.solver.engine_name(),
        schedule_id: state.solver.schedule_id(),
    })
}

// ============================================================================
// Schedule
// ============================================================================

/// GET /schedule - Current schedule with fresh score and solver status.
#[utoipa::path(
    get,
    path = "/schedule",
    responses(
        (status = 200, description = "Current schedule", body = ScheduleDto),
        (status = 404, description = "Schedule not found", body = ApiError)
    )
)]
async fn get_schedule(State(state): State<Arc<AppState>>) -> Result<Json<ScheduleDto>, AppError> {
    let schedule = state.solver.fetch_current(state.solver.schedule_id())?;
    Ok(Json(ScheduleDto::from_schedule(&schedule)))
}

/// POST /schedule/solve - Start solving in the background.
#[utoipa::path(
    post,
    path = "/schedule/solve",
    responses(
        (status = 200, description = "Solving started"),
        (status = 409, description = "Already solving", body = ApiError)
    )
)]
async fn solve(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.solver.submit(state.solver.schedule_id())?;
    Ok(StatusCode::OK)
}

/// POST /schedule/stopSolving - Request early termination.
#[utoipa::path(
    post,
    path = "/schedule/stopSolving",
    responses((status = 200, description = "Stop requested"))
)]
async fn stop_solving(State(state): State<Arc<AppState>>) -> Result<StatusCode, AppError> {
    state.solver.stop_early(state.solver.schedule_id())?;
    Ok(StatusCode::OK)
}

/// GET /schedule/status - Solver status, score and persistence diagnostics.
#[utoipa::path(
    get,
    path = "/schedule/status",
    responses(
        (status = 200, description = "Solver status", body = StatusResponse),
        (status = 404, description = "Schedule not found", body = ApiError)
    )
)]
async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let id = state.solver.schedule_id();
    let schedule = state.solver.fetch_current(id)?;
    Ok(Json(StatusResponse {
        solver_status: schedule.solver_status.unwrap_or_default(),
        score: schedule.score.map(|s| s.to_string()),
        diagnostics: state.solver.diagnostics(id),
    }))
}

/// GET /schedule/analyze - Score breakdown by constraint.
#[utoipa::path(
    get,
    path = "/schedule/analyze",
    responses(
        (status = 200, description = "Constraint analysis", body = ScoreAnalysis),
        (status = 404, description = "Schedule not found", body = ApiError)
    )
)]
async fn analyze_schedule(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ScoreAnalysis>, AppError> {
    let schedule = state.solver.fetch_current(state.solver.schedule_id())?;
    Ok(Json(analyze(&schedule)))
}

// ============================================================================
// OpenAPI Documentation
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(health, info, get_schedule, solve, stop_solving, get_status, analyze_schedule),
    components(schemas(
        HealthResponse,
        InfoResponse,
        ApiError,
        ScheduleDto,
        MaintainableUnitDto,
        MutuallyExclusiveJobsDto,
        CrewDto,
        TimeGrainDto,
        JobDto,
        AssignmentDto,
        StatusResponse,
        SolverStatus,
        SolveDiagnostics,
        SolveOutcomeKind,
        ScoreAnalysis,
        ConstraintAnalysis,
    ))
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::*;
    use crate::engine::{LocalSearchEngine, SolverConfig};
    use crate::repository::InMemoryRepository;
    use crate::solver::OrchestratorConfig;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    fn schedule() -> MaintenanceSchedule {
        let date = NaiveDate::from_ymd_opt(2025, 1, 6).unwrap();
        MaintenanceSchedule::new(
            SINGLETON_SCHEDULE_ID,
            vec![MaintainableUnit::new(1, "Bridge")],
            vec![],
            vec![MaintenanceCrew::new(1, "Alpha crew"), MaintenanceCrew::new(2, "Beta crew")],
            (0..5).map(|i| TimeGrain::new(i as u64 + 1, i, date, 480 + 60 * i as u32)).collect(),
            vec![
                MaintenanceJobAssignment::new(1, MaintenanceJob::new(1, "Inspect", 1, 0, 5, 1)),
                MaintenanceJobAssignment::new(2, MaintenanceJob::new(2, "Paint", 1, 0, 5, 2)),
            ],
        )
    }

    fn state_with(repository: InMemoryRepository, config: SolverConfig) -> Arc<AppState> {
        let solver = SolverService::new(
            Arc::new(repository),
            Arc::new(LocalSearchEngine::new(config)),
            OrchestratorConfig::default(),
        );
        Arc::new(AppState::new(Arc::new(solver)))
    }

    fn state() -> Arc<AppState> {
        state_with(
            InMemoryRepository::from_schedule(&schedule()),
            SolverConfig {
                step_limit: Some(200),
                random_seed: Some(0),
                ..SolverConfig::default()
            },
        )
    }

    async fn send(state: &Arc<AppState>, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn wait_until_idle(state: &Arc<AppState>) {
        for _ in 0..1_000 {
            if !state.solver.status(SINGLETON_SCHEDULE_ID).is_solving() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("solve did not finish");
    }

    #[tokio::test]
    async fn test_health_and_info() {
        let state = state();
        let (status, body) = send(&state, "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UP");

        let (status, body) = send(&state, "GET", "/info").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Maintenance Scheduling");
        assert_eq!(body["solverEngine"], "LocalSearchEngine");
    }

    #[tokio::test]
    async fn test_get_schedule_before_solving() {
        let state = state();
        let (status, body) = send(&state, "GET", "/schedule").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["solverStatus"], "NOT_SOLVING");
        assert_eq!(body["score"], "0hard/-200soft");
        assert_eq!(body["assignments"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["crews"][0]["crewName"], "Alpha crew");
    }

    #[tokio::test]
    async fn test_solve_assigns_all_jobs() {
        let state = state();
        let (status, _) = send(&state, "POST", "/schedule/solve").await;
        assert_eq!(status, StatusCode::OK);
        wait_until_idle(&state).await;

        let (status, body) = send(&state, "GET", "/schedule").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["solverStatus"], "NOT_SOLVING");
        let assignments = body["assignments"].as_array().cloned().unwrap_or_default();
        assert!(assignments.iter().all(|a| a["assignedCrew"].is_u64()));

        let (status, body) = send(&state, "GET", "/schedule/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["diagnostics"]["lastOutcome"], "CONVERGED");
        assert!(body["diagnostics"]["improvementsPersisted"].as_u64().unwrap_or(0) >= 1);
    }

    #[tokio::test]
    async fn test_second_solve_conflicts_until_stopped() {
        let state = state_with(
            InMemoryRepository::from_schedule(&schedule()),
            SolverConfig {
                time_limit: Some(Duration::from_secs(30)),
                ..SolverConfig::default()
            },
        );
        assert_eq!(send(&state, "POST", "/schedule/solve").await.0, StatusCode::OK);

        let (status, body) = send(&state, "POST", "/schedule/solve").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "ALREADY_SOLVING");

        let (status, _) = send(&state, "POST", "/schedule/stopSolving").await;
        assert_eq!(status, StatusCode::OK);
        wait_until_idle(&state).await;

        let (_, body) = send(&state, "GET", "/schedule/status").await;
        assert_eq!(body["solverStatus"], "NOT_SOLVING");
        assert_eq!(body["diagnostics"]["lastOutcome"], "TERMINATED_EARLY");
    }

    #[tokio::test]
    async fn test_stop_when_idle_succeeds() {
        let state = state();
        let (status, _) = send(&state, "POST", "/schedule/stopSolving").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.solver.status(SINGLETON_SCHEDULE_ID), SolverStatus::NotSolving);
    }

    #[tokio::test]
    async fn test_analyze_lists_every_constraint() {
        let state = state();
        let (status, body) = send(&state, "GET", "/schedule/analyze").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["constraints"].as_array().map(Vec::len), Some(9));
        assert_eq!(body["score"], "0hard/-200soft");
    }

    #[tokio::test]
    async fn test_missing_schedule_is_not_found() {
        let state = state_with(InMemoryRepository::new(9), SolverConfig::default());
        let (status, body) = send(&state, "GET", "/schedule").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_openapi_document_is_served() {
        let state = state();
        let (status, body) = send(&state, "GET", "/api-docs/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/schedule/solve"].is_object());
    }

    #[test]
    fn test_error_status_codes() {
        let cases = [
            (SolveError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (SolveError::AlreadySolving(1), StatusCode::CONFLICT),
            (SolveError::InvalidState(2), StatusCode::BAD_REQUEST),
            (SolveError::PersistenceFailure("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(AppError::from(err).into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_worker_failure_has_its_own_code() {
        let response = AppError::from(SolveError::Worker("no threads".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "WORKER_FAILURE");
        assert!(body["message"].as_str().is_some_and(|m| m.contains("no threads")));
    }
}
