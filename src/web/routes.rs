use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::feed::{self, FeedError};
use crate::geo::ObserverLocation;
use crate::model::{find_by_id, Advisory, EarthquakeReport, FeedSummary, Severity};
use crate::prefs::{Preferences, PrefsError};
use crate::web::WebState;
use crate::worker::CheckReport;

pub fn create_router(state: WebState) -> Router {
    Router::new()
        .route("/api/earthquakes", get(list_earthquakes))
        .route("/api/earthquakes/:id", get(get_earthquake))
        .route("/api/stats", get(get_stats))
        .route("/api/preferences", get(get_preferences).put(update_preferences))
        .route("/api/checks", get(get_checks))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub enum ApiError {
    Feed(FeedError),
    Prefs(PrefsError),
    NotFound(String),
}

impl From<FeedError> for ApiError {
    fn from(e: FeedError) -> Self {
        ApiError::Feed(e)
    }
}

impl From<PrefsError> for ApiError {
    fn from(e: PrefsError) -> Self {
        ApiError::Prefs(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Feed(e) => {
                tracing::warn!("Feed error while serving API: {}", e);
                (StatusCode::BAD_GATEWAY, e.to_string())
            }
            ApiError::Prefs(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::NotFound(id) => (StatusCode::NOT_FOUND, format!("earthquake '{}' not found", id)),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EarthquakeView {
    #[serde(flatten)]
    pub report: EarthquakeReport,
    pub severity: Severity,
    pub distance_km: Option<f64>,
    pub perceptible: Option<bool>,
}

impl EarthquakeView {
    fn new(report: EarthquakeReport, observer: Option<&ObserverLocation>) -> Self {
        Self {
            severity: report.severity(),
            distance_km: observer.map(|o| report.distance_to(o)),
            perceptible: observer.map(|o| report.is_perceptible_at(o)),
            report,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EarthquakeDetail {
    #[serde(flatten)]
    pub view: EarthquakeView,
    pub advisory: Advisory,
    pub advisory_title: String,
    pub advice: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreferencesView {
    #[serde(flatten)]
    pub preferences: Preferences,
    pub monitoring: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PreferencesUpdate {
    pub notifications_enabled: Option<bool>,
    pub location_enabled: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChecksView {
    pub reports: Vec<CheckReport>,
    pub retries: u64,
}

impl WebState {
    async fn fetch(&self) -> Result<Vec<EarthquakeReport>, FeedError> {
        feed::fetch_reports(self.feed.as_ref(), self.id_scheme).await
    }

    fn observer(&self) -> Result<Option<ObserverLocation>, PrefsError> {
        Ok(if self.prefs.location_enabled()? {
            self.location.last_known()
        } else {
            None
        })
    }

    fn monitoring(&self) -> bool {
        self.monitoring.as_ref().map_or(false, |m| m.is_running())
    }
}

async fn list_earthquakes(State(state): State<WebState>) -> Result<Json<Vec<EarthquakeView>>, ApiError> {
    let reports = state.fetch().await?;
    let observer = state.observer()?;
    Ok(Json(
        reports
            .into_iter()
            .map(|r| EarthquakeView::new(r, observer.as_ref()))
            .collect(),
    ))
}

async fn get_earthquake(
    State(state): State<WebState>,
    Path(id): Path<String>,
) -> Result<Json<EarthquakeDetail>, ApiError> {
    let reports = state.fetch().await?;
    let report = find_by_id(&reports, &id).cloned().ok_or(ApiError::NotFound(id))?;
    let observer = state.observer()?;
    let advisory = report.advisory();
    Ok(Json(EarthquakeDetail {
        view: EarthquakeView::new(report, observer.as_ref()),
        advisory,
        advisory_title: advisory.title().to_string(),
        advice: advisory.advice().iter().map(|s| s.to_string()).collect(),
    }))
}

async fn get_stats(State(state): State<WebState>) -> Result<Json<FeedSummary>, ApiError> {
    let reports = state.fetch().await?;
    Ok(Json(FeedSummary::from_reports(&reports)))
}

async fn get_preferences(State(state): State<WebState>) -> Result<Json<PreferencesView>, ApiError> {
    Ok(Json(PreferencesView {
        preferences: state.prefs.load()?,
        monitoring: state.monitoring(),
    }))
}

async fn update_preferences(
    State(state): State<WebState>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<PreferencesView>, ApiError> {
    if let Some(enabled) = update.location_enabled {
        state.prefs.set_location_enabled(enabled)?;
    }
    if let Some(enabled) = update.notifications_enabled {
        match &state.monitoring {
            Some(monitoring) => monitoring.set_notifications_enabled(enabled)?,
            None => state.prefs.set_notifications_enabled(enabled)?,
        }
    }
    get_preferences(State(state)).await
}

async fn get_checks(State(state): State<WebState>) -> Json<ChecksView> {
    let (reports, retries) = match state.history.lock() {
        Ok(history) => (history.reports(), history.retries()),
        Err(_) => (Vec::new(), 0),
    };
    Json(ChecksView { reports, retries })
}
