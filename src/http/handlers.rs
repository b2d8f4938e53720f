//! HTTP request handlers for the Duende REST API.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::content::{night_plan_prompt, trip_prompt, NO_EVENTS_FALLBACK};
use crate::planner::{QueryPlanner, SearchError};
use crate::types::{Category, Event, SearchOutcome, SearchRequest, TopArtist};

use super::AppState;

/// Build the axum router with all routes
pub(super) fn router(state: Arc<AppState>) -> axum::Router {
    use axum::routing::{get, post};
    use tower_http::trace::TraceLayer;

    axum::Router::new()
        .route("/api/events", get(search_events))
        .route("/api/events/count", get(count_events))
        .route("/api/night-plan", get(night_plan))
        .route("/api/trip-planner", post(trip_planner))
        .route("/api/subscribe", post(subscribe))
        .route("/api/analytics/track", post(track_interaction))
        .route("/api/analytics/top-artists", get(top_artists))
        .route("/api/analytics/total-views", get(total_views))
        .route("/api/config", get(app_config))
        .route("/api/admin/batch-generate", post(batch_generate))
        .layer(cors_layer(&state.config.server.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> tower_http::cors::CorsLayer {
    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    tower_http::cors::CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Error response body
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

type ErrorResponse = (StatusCode, Json<ErrorBody>);

fn bad_request(message: impl Into<String>) -> ErrorResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// Map internal errors to HTTP 500 with a generic body. The detail
/// stays in the log, never in the response.
fn internal_error(err: anyhow::Error) -> ErrorResponse {
    tracing::error!("Internal error: {:#}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "Internal server error".to_string(),
        }),
    )
}

fn content_unavailable() -> ErrorResponse {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody {
            error: "Content generation is not configured".to_string(),
        }),
    )
}

fn today_string() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

// -- /api/events --

#[derive(Serialize)]
#[serde(untagged)]
enum SearchResponse {
    #[serde(rename_all = "camelCase")]
    Results {
        events: Vec<Event>,
        is_ambiguous: bool,
    },
    #[serde(rename_all = "camelCase")]
    Ambiguous {
        is_ambiguous: bool,
        search_term: String,
        options: Vec<Category>,
    },
}

pub(super) async fn search_events(
    State(state): State<Arc<AppState>>,
    Query(request): Query<SearchRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let store = state.store.lock().await;
    let outcome = state.planner.search(&store, &request).map_err(|e| match e {
        SearchError::Plan(plan) => bad_request(plan.to_string()),
        SearchError::Store(err) => internal_error(err),
    })?;

    let response = match outcome {
        SearchOutcome::Results(events) => SearchResponse::Results {
            events,
            is_ambiguous: false,
        },
        SearchOutcome::Ambiguous { term, options } => SearchResponse::Ambiguous {
            is_ambiguous: true,
            search_term: term,
            options,
        },
    };

    Ok((
        [(
            header::CACHE_CONTROL,
            "s-maxage=60, stale-while-revalidate",
        )],
        Json(response),
    ))
}

// -- /api/events/count --

#[derive(Serialize)]
struct CountResponse {
    total: u64,
}

pub(super) async fn count_events(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let today = chrono::Local::now().date_naive();
    let filter = QueryPlanner::eligibility_filter(today);

    let store = state.store.lock().await;
    let total = store.count_matching(&filter).map_err(internal_error)?;

    Ok((
        [(header::CACHE_CONTROL, "no-store, max-age=0")],
        Json(CountResponse { total }),
    ))
}

// -- /api/night-plan --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct NightPlanParams {
    event_id: Option<String>,
}

#[derive(Serialize)]
struct NightPlanResponse {
    content: String,
    source: &'static str,
}

pub(super) async fn night_plan(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NightPlanParams>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let raw_id = params
        .event_id
        .ok_or_else(|| bad_request("Missing event id"))?;
    let id: i64 = raw_id
        .trim()
        .parse()
        .map_err(|_| bad_request("Invalid event id"))?;

    let event = {
        let store = state.store.lock().await;
        store.event(id).map_err(internal_error)?
    };
    let event = event.ok_or((
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Event not found".to_string(),
        }),
    ))?;

    let headers = [(header::CACHE_CONTROL, "no-store, max-age=0")];

    if let Some(content) = event.night_plan.clone() {
        tracing::debug!(event = event.id, "Returning cached night plan");
        return Ok((
            headers,
            Json(NightPlanResponse {
                content,
                source: "cache",
            }),
        ));
    }

    let generator = state.generator.as_ref().ok_or_else(content_unavailable)?;
    tracing::info!(event = event.id, name = %event.name, "Generating night plan");
    let content = generator
        .generate(&night_plan_prompt(&event))
        .await
        .map_err(|e| internal_error(e.into()))?;

    let store = state.store.lock().await;
    store
        .set_night_plan(event.id, &content)
        .map_err(internal_error)?;

    Ok((
        headers,
        Json(NightPlanResponse {
            content,
            source: "generated",
        }),
    ))
}

// -- /api/trip-planner --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TripPlanRequest {
    destination: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Serialize)]
struct TripPlanResponse {
    text: String,
}

pub(super) async fn trip_planner(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TripPlanRequest>,
) -> Result<Json<TripPlanResponse>, ErrorResponse> {
    let (destination, start_date, end_date) = match (
        request.destination.filter(|v| !v.trim().is_empty()),
        request.start_date.filter(|v| !v.trim().is_empty()),
        request.end_date.filter(|v| !v.trim().is_empty()),
    ) {
        (Some(d), Some(s), Some(e)) => (d, s, e),
        _ => return Err(bad_request("Missing trip plan fields")),
    };

    let events = {
        let store = state.store.lock().await;
        store
            .find_by_city_and_range(&destination, &start_date, &end_date)
            .map_err(internal_error)?
    };

    if events.is_empty() {
        return Ok(Json(TripPlanResponse {
            text: NO_EVENTS_FALLBACK.to_string(),
        }));
    }

    let generator = state.generator.as_ref().ok_or_else(content_unavailable)?;
    let prompt = trip_prompt(&destination, &start_date, &end_date, &events);
    let text = generator
        .generate(&prompt)
        .await
        .map_err(|e| internal_error(e.into()))?;

    Ok(Json(TripPlanResponse { text }))
}

// -- /api/subscribe --

#[derive(Serialize)]
struct SubscribeResponse {
    success: bool,
}

pub(super) async fn subscribe(
    State(state): State<Arc<AppState>>,
    Json(subscription): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let endpoint = subscription
        .get("endpoint")
        .and_then(|v| v.as_str())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| bad_request("Subscription object is missing or invalid"))?
        .to_string();

    let store = state.store.lock().await;
    store
        .upsert_subscription(&endpoint, &subscription)
        .map_err(internal_error)?;

    tracing::info!(%endpoint, "Subscription saved");
    Ok((StatusCode::CREATED, Json(SubscribeResponse { success: true })))
}

// -- /api/analytics/track --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TrackRequest {
    #[serde(rename = "type")]
    kind: Option<String>,
    session_id: Option<String>,
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct TrackResponse {
    msg: String,
}

pub(super) async fn track_interaction(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrackRequest>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let (kind, session_id, details) = match (
        request.kind.filter(|v| !v.is_empty()),
        request.session_id.filter(|v| !v.is_empty()),
        request.details,
    ) {
        (Some(k), Some(s), Some(d)) => (k, s, d),
        _ => return Err(bad_request("Missing interaction fields")),
    };

    let event_id = details.get("eventId").and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    });

    let store = state.store.lock().await;
    store
        .record_interaction(&kind, &session_id, event_id, &details)
        .map_err(internal_error)?;

    Ok((
        StatusCode::CREATED,
        Json(TrackResponse {
            msg: "Interaction recorded".to_string(),
        }),
    ))
}

// -- /api/analytics/top-artists --

pub(super) async fn top_artists(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let store = state.store.lock().await;
    let top: Vec<TopArtist> = store.top_artists(10).map_err(internal_error)?;

    Ok((
        [(
            header::CACHE_CONTROL,
            "s-maxage=3600, stale-while-revalidate",
        )],
        Json(top),
    ))
}

// -- /api/analytics/total-views --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TotalViewsResponse {
    total_views: u64,
}

pub(super) async fn total_views(
    State(state): State<Arc<AppState>>,
) -> Result<Json<TotalViewsResponse>, ErrorResponse> {
    let store = state.store.lock().await;
    let total_views = store.total_event_views().map_err(internal_error)?;
    Ok(Json(TotalViewsResponse { total_views }))
}

// -- /api/config --

pub(super) async fn app_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ErrorResponse> {
    let store = state.store.lock().await;
    let config = store.app_config().map_err(internal_error)?;
    Ok(Json(config))
}

// -- /api/admin/batch-generate --

#[derive(Deserialize)]
pub(super) struct AdminParams {
    secret: Option<String>,
}

#[derive(Serialize)]
struct BatchResponse {
    message: String,
    generated: usize,
    failed: usize,
    remaining: u64,
}

pub(super) async fn batch_generate(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AdminParams>,
) -> Result<Json<BatchResponse>, ErrorResponse> {
    let authorized = matches!(
        (state.config.server.resolve_admin_secret(), params.secret),
        (Some(expected), Some(provided)) if expected == provided
    );
    if !authorized {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "Unauthorized".to_string(),
            }),
        ));
    }

    let generator = state.generator.as_ref().ok_or_else(content_unavailable)?;

    let outcome = crate::content::batch::run_batch(
        &state.store,
        generator.as_ref(),
        &today_string(),
        state.config.content.batch_size,
    )
    .await
    .map_err(internal_error)?;

    let message = if outcome.generated == 0 && outcome.remaining == 0 {
        "Nothing left to generate".to_string()
    } else {
        format!(
            "{} plans generated in this batch, {} remaining. Run again to continue.",
            outcome.generated, outcome.remaining
        )
    };

    Ok(Json(BatchResponse {
        message,
        generated: outcome.generated,
        failed: outcome.failed,
        remaining: outcome.remaining,
    }))
}
