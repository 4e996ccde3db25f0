use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::dashboard::{Dashboard, DashboardReport};
use crate::eia::{FetchError, MetricKind};
use crate::forecast::{Forecast, ForecastError};
use crate::series::TimeSeries;

#[derive(Clone)]
pub struct AppState {
    dashboard: Arc<Dashboard>,
}

impl AppState {
    pub fn new(dashboard: Dashboard) -> Self {
        Self {
            dashboard: Arc::new(dashboard),
        }
    }
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Error body with the status the failure maps to
struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.message))).into_response()
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        let status = match &err {
            FetchError::UnsupportedMetric(_) | FetchError::UnknownRegion(_) => {
                StatusCode::BAD_REQUEST
            }
            FetchError::NoData { .. } => StatusCode::NOT_FOUND,
            FetchError::UpstreamUnavailable { .. } | FetchError::Parse { .. } => {
                tracing::warn!(error = %err, "upstream failure");
                StatusCode::BAD_GATEWAY
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        let status = match &err {
            ForecastError::InsufficientHistory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ForecastError::InvalidHorizon { .. } => StatusCode::BAD_REQUEST,
            ForecastError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Serialize)]
struct RegionInfo {
    code: String,
    name: String,
}

#[derive(Deserialize)]
struct HorizonQuery {
    /// Hours to forecast (default: configured horizon)
    hours: Option<usize>,
}

#[derive(Serialize)]
struct ForecastResponse {
    history: TimeSeries,
    forecast: Forecast,
}

/// GET /api/v1/regions
async fn list_regions(State(state): State<AppState>) -> Json<ApiResponse<Vec<RegionInfo>>> {
    let regions = state
        .dashboard
        .client()
        .regions()
        .iter()
        .map(|ba| RegionInfo {
            code: ba.code.clone(),
            name: ba.name.clone(),
        })
        .collect();

    Json(ApiResponse::success(regions))
}

/// GET /api/v1/regions/{region}/series/{metric}
/// Raw hourly series over the default rolling window
async fn get_series(
    State(state): State<AppState>,
    Path((region, metric)): Path<(String, String)>,
) -> ApiResult<TimeSeries> {
    let series = state
        .dashboard
        .client()
        .fetch_named(&region, &metric, None)
        .await?;

    Ok(Json(ApiResponse::success(series)))
}

/// GET /api/v1/regions/{region}/forecast?hours=N
/// Demand history with its forecast
async fn get_forecast(
    State(state): State<AppState>,
    Path(region): Path<String>,
    Query(query): Query<HorizonQuery>,
) -> ApiResult<ForecastResponse> {
    let hours = query.hours.unwrap_or(state.dashboard.horizon_hours());
    let history = state
        .dashboard
        .client()
        .fetch(&region, MetricKind::Demand, None)
        .await?;
    let forecast = state.dashboard.forecast(&history, hours).await?;

    Ok(Json(ApiResponse::success(ForecastResponse { history, forecast })))
}

/// GET /api/v1/regions/{region}/dashboard
/// All panels; individual panels report their own failures
async fn get_dashboard(
    State(state): State<AppState>,
    Path(region): Path<String>,
) -> ApiResult<DashboardReport> {
    let report = state.dashboard.render(&region, None).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/regions", get(list_regions))
        .route(
            "/api/v1/regions/{region}/series/{metric}",
            get(get_series),
        )
        .route("/api/v1/regions/{region}/forecast", get(get_forecast))
        .route("/api/v1/regions/{region}/dashboard", get(get_dashboard))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(bind_address: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "server listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
