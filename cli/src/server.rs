use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use crate::estimator::EstimatorClient;
use nutrilog_core::aggregate::{DateOrder, DayBucket};
use nutrilog_core::error::NutrilogError;
use nutrilog_core::history::MAX_HISTORY_DAYS;
use nutrilog_core::models::{
    CalorieBump, ExerciseEntry, FoodEntry, Goals, NewExerciseEntry, NewFoodEntry,
    NewWeightEntry, Profile, UpdateFoodEntry, WeightEntry, validate_food_update,
    validate_goals, validate_new_exercise, validate_new_food, validate_weight_kg,
};
use nutrilog_core::service::{
    DaySummary, EstimatePreview, HistoryReport, NutrilogService, Session, WeightView,
};
use nutrilog_core::units::{UnitPreference, weight_from_unit};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB
const DEFAULT_HISTORY_DAYS: u32 = 30;

#[derive(Clone)]
struct AppState {
    service: Arc<Mutex<NutrilogService>>,
    session: Session,
    estimator: Option<Arc<EstimatorClient>>,
    api_key: Option<String>,
}

impl AppState {
    fn service(&self) -> MutexGuard<'_, NutrilogService> {
        self.service
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct CreateFoodRequest {
    name: String,
    calories: f64,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct UpdateFoodRequest {
    name: Option<String>,
    calories: Option<f64>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct BumpRequest {
    amount: String,
}

#[derive(Deserialize)]
struct CreateExerciseRequest {
    exercise: String,
    calories_burned: f64,
    category: Option<String>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct CreateWeightRequest {
    weight: f64,
    #[serde(default = "default_weight_unit")]
    unit: String,
    date: Option<String>,
    notes: Option<String>,
}

fn default_weight_unit() -> String {
    "kg".to_string()
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    display_name: Option<String>,
    goals: Option<Goals>,
    unit_preference: Option<String>,
}

#[derive(Deserialize)]
struct EstimateRequest {
    description: String,
    date: Option<String>,
    #[serde(default)]
    log: bool,
}

#[derive(Deserialize)]
struct LogQuery {
    order: Option<String>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    days: Option<u32>,
}

#[derive(Deserialize)]
struct WeightHistoryQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
struct LogResponse {
    foods: Vec<DayBucket<FoodEntry>>,
    exercises: Vec<DayBucket<ExerciseEntry>>,
}

#[derive(Serialize)]
struct EstimateResponse {
    preview: EstimatePreview,
    logged: Vec<FoodEntry>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Upstream(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<NutrilogError>() {
            Some(NutrilogError::NotFound(_)) => Self::NotFound(err.to_string()),
            Some(NutrilogError::UnusableEstimate { .. }) => Self::Upstream(err.to_string()),
            Some(NutrilogError::NotAuthorized) | None => Self::Internal(err),
        }
    }
}

fn bad_request(err: &anyhow::Error) -> ApiError {
    ApiError::BadRequest(err.to_string())
}

/// `None` means today in the server's local time zone.
fn parse_request_date(date: Option<&str>) -> Result<NaiveDate, ApiError> {
    match date {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("Invalid date '{s}'. Use YYYY-MM-DD"))),
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            tracing::debug!(path = %request.uri().path(), "rejected unauthenticated request");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Read handlers ---

async fn get_day_summary(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<Json<DaySummary>, ApiError> {
    let date = parse_request_date(Some(&date_str))?;
    let summary = state.service().day_summary(&state.session, date)?;
    Ok(Json(summary))
}

async fn get_log(
    State(state): State<AppState>,
    Query(params): Query<LogQuery>,
) -> Result<Json<LogResponse>, ApiError> {
    let order = match params.order.as_deref() {
        None | Some("desc") => DateOrder::Descending,
        Some("asc") => DateOrder::Ascending,
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Invalid order '{other}'. Use 'asc' or 'desc'"
            )));
        }
    };

    let svc = state.service();
    let foods = svc.food_log(&state.session, order)?;
    let exercises = svc.exercise_log(&state.session, order)?;
    Ok(Json(LogResponse { foods, exercises }))
}

async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryReport>, ApiError> {
    let days = params.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if days == 0 || days > MAX_HISTORY_DAYS {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {MAX_HISTORY_DAYS}"
        )));
    }
    let today = Local::now().date_naive();
    let report = state.service().recent_history(&state.session, days, today)?;
    Ok(Json(report))
}

// --- Food handlers ---

async fn create_food(
    State(state): State<AppState>,
    Json(req): Json<CreateFoodRequest>,
) -> Result<(StatusCode, Json<FoodEntry>), ApiError> {
    let food = NewFoodEntry {
        name: req.name,
        calories: req.calories,
        protein: req.protein,
        carbs: req.carbs,
        fat: req.fat,
        eaten_at: parse_request_date(req.date.as_deref())?,
    };
    validate_new_food(&food).map_err(|e| bad_request(&e))?;

    let entry = state.service().log_food(&state.session, &food)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateFoodRequest>,
) -> Result<Json<FoodEntry>, ApiError> {
    let eaten_at = match req.date.as_deref() {
        Some(d) => Some(parse_request_date(Some(d))?),
        None => None,
    };
    let update = UpdateFoodEntry {
        name: req.name,
        calories: req.calories,
        protein: req.protein,
        carbs: req.carbs,
        fat: req.fat,
        eaten_at,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }
    validate_food_update(&update).map_err(|e| bad_request(&e))?;

    let entry = state.service().edit_food(&state.session, id, &update)?;
    Ok(Json(entry))
}

async fn bump_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<BumpRequest>,
) -> Result<Json<FoodEntry>, ApiError> {
    let bump = CalorieBump::parse(&req.amount).map_err(|e| bad_request(&e))?;
    let entry = state.service().bump_food(&state.session, id, bump)?;
    Ok(Json(entry))
}

async fn delete_food(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service().delete_food(&state.session, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Exercise handlers ---

async fn create_exercise(
    State(state): State<AppState>,
    Json(req): Json<CreateExerciseRequest>,
) -> Result<(StatusCode, Json<ExerciseEntry>), ApiError> {
    let exercise = NewExerciseEntry {
        exercise: req.exercise,
        calories_burned: req.calories_burned,
        category: req.category,
        completed_at: parse_request_date(req.date.as_deref())?,
    };
    validate_new_exercise(&exercise).map_err(|e| bad_request(&e))?;

    let entry = state.service().log_exercise(&state.session, &exercise)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_exercise(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service().delete_exercise(&state.session, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Weight handlers ---

async fn create_weight(
    State(state): State<AppState>,
    Json(req): Json<CreateWeightRequest>,
) -> Result<(StatusCode, Json<WeightEntry>), ApiError> {
    let weight_kg = weight_from_unit(req.weight, &req.unit).map_err(|e| bad_request(&e))?;
    validate_weight_kg(weight_kg).map_err(|e| bad_request(&e))?;

    let entry = NewWeightEntry {
        weight_kg,
        logged_at: parse_request_date(req.date.as_deref())?,
        notes: req.notes,
    };
    let saved = state.service().log_weight(&state.session, &entry)?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_weight_history(
    State(state): State<AppState>,
    Query(params): Query<WeightHistoryQuery>,
) -> Result<Json<Vec<WeightView>>, ApiError> {
    let entries = state.service().weight_history(&state.session, params.limit.map(i64::from))?;
    Ok(Json(entries))
}

async fn delete_weight(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service().delete_weight(&state.session, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Profile handlers ---

async fn get_profile(State(state): State<AppState>) -> Result<Json<Profile>, ApiError> {
    let profile = state.service().ensure_profile(&state.session)?;
    Ok(Json(profile))
}

/// Fields left out of the body keep their current values. `goals` replaces
/// all four goals at once; send `null` for a goal to clear it.
async fn update_profile(
    State(state): State<AppState>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let preference = match req.unit_preference.as_deref() {
        None => None,
        Some("metric") => Some(UnitPreference::Metric),
        Some("imperial") => Some(UnitPreference::Imperial),
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "Invalid unit_preference '{other}'. Use 'metric' or 'imperial'"
            )));
        }
    };
    if let Some(ref goals) = req.goals {
        validate_goals(goals).map_err(|e| bad_request(&e))?;
    }

    let svc = state.service();
    let mut profile = svc.ensure_profile(&state.session)?;
    if let Some(ref name) = req.display_name {
        profile = svc.set_display_name(&state.session, Some(name))?;
    }
    if let Some(ref goals) = req.goals {
        profile = svc.set_goals(&state.session, goals)?;
    }
    if let Some(preference) = preference {
        profile = svc.set_unit_preference(&state.session, preference)?;
    }
    Ok(Json(profile))
}

// --- Estimation ---

async fn estimate(
    State(state): State<AppState>,
    Json(req): Json<EstimateRequest>,
) -> Result<(StatusCode, Json<EstimateResponse>), ApiError> {
    let description = req.description.trim();
    if description.is_empty() {
        return Err(ApiError::BadRequest(
            "description must not be empty".to_string(),
        ));
    }
    let date = parse_request_date(req.date.as_deref())?;

    let Some(estimator) = state.estimator.clone() else {
        return Err(ApiError::Upstream(
            "Estimation service is not configured".to_string(),
        ));
    };

    // The lock is taken only after the upstream call completes
    let items = estimator.estimate_async(description).await.map_err(|e| {
        tracing::warn!(error = %format!("{e:#}"), "estimation failed");
        ApiError::Upstream("Estimation service unavailable".to_string())
    })?;

    let svc = state.service();
    let preview = svc.project_items(&state.session, items, date)?;
    let (status, logged) = if req.log {
        let logged = svc.log_estimate(&state.session, &preview.items, date)?;
        (StatusCode::CREATED, logged)
    } else {
        (StatusCode::OK, Vec::new())
    };
    Ok((status, Json(EstimateResponse { preview, logged })))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/summary/{date}", get(get_day_summary))
        .route("/api/log", get(get_log))
        .route("/api/history", get(get_history))
        .route("/api/foods", post(create_food))
        .route("/api/foods/{id}", delete(delete_food).patch(update_food))
        .route("/api/foods/{id}/bump", post(bump_food))
        .route("/api/exercises", post(create_exercise))
        .route("/api/exercises/{id}", delete(delete_exercise))
        .route("/api/weights", post(create_weight).get(get_weight_history))
        .route("/api/weights/{id}", delete(delete_weight))
        .route("/api/profile", get(get_profile).put(update_profile))
        .route("/api/estimate", post(estimate))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

/// First and last four characters, enough to tell keys apart.
fn key_hint(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

// --- Server startup ---

pub async fn start_server(
    service: NutrilogService,
    session: Session,
    estimator: Option<EstimatorClient>,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        service: Arc::new(Mutex::new(service)),
        session,
        estimator: estimator.map(Arc::new),
        api_key: api_key.clone(),
    };

    if state.estimator.is_none() {
        eprintln!("Note: NUTRILOG_ESTIMATE_URL is not set. POST /api/estimate will return 502.");
    }

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {} (see api_key file in data directory)",
            key_hint(key)
        );
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!(%bind, port, "server listening");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
