pub mod history;
pub mod routes;

use std::sync::{Arc, Mutex};

use crate::feed::EarthquakeFeed;
use crate::location::LocationProvider;
use crate::model::IdScheme;
use crate::prefs::PreferenceStore;
use crate::scheduler::MonitoringControl;

pub use history::{CheckHistory, SharedHistory};

#[derive(Clone)]
pub struct WebState {
    pub feed: Arc<dyn EarthquakeFeed>,
    pub id_scheme: IdScheme,
    pub prefs: Arc<dyn PreferenceStore>,
    pub location: Arc<dyn LocationProvider>,
    pub monitoring: Option<Arc<MonitoringControl>>,
    pub history: SharedHistory,
}

impl WebState {
    pub fn new(
        feed: Arc<dyn EarthquakeFeed>,
        id_scheme: IdScheme,
        prefs: Arc<dyn PreferenceStore>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            feed,
            id_scheme,
            prefs,
            location,
            monitoring: None,
            history: Arc::new(Mutex::new(CheckHistory::new(100))),
        }
    }

    pub fn with_monitoring(mut self, monitoring: Arc<MonitoringControl>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    pub fn with_history(mut self, history: SharedHistory) -> Self {
        self.history = history;
        self
    }
}

pub async fn serve(
    bind: &str,
    state: WebState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("JSON API listening on {}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
