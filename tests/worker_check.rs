mod common;

use common::{prefs, raw, PanickingFeed, RecordingNotifier, StaticFeed};
use quake_watch::location::{FixedLocation, NoLocation};
use quake_watch::notify::NotifierSet;
use quake_watch::prefs::PreferenceStore;
use quake_watch::{AlertDedupState, CheckOutcome, ObserverLocation, QuakeWorker, RelevanceConfig};
use std::sync::Arc;

const SANTIAGO: ObserverLocation = ObserverLocation {
    latitude: -33.45,
    longitude: -70.66,
};

fn two_strong_quakes() -> Vec<quake_watch::feed::RawEarthquake> {
    vec![
        raw("A", "", "Valparaíso", "6.0", "-33.04", "-71.61"),
        raw("B", "", "San Antonio", "6.0", "-33.59", "-71.61"),
    ]
}

#[tokio::test]
async fn test_dedup_across_consecutive_checks() {
    let feed = StaticFeed::ok(two_strong_quakes());
    let notifier = RecordingNotifier::new();
    let mut worker = QuakeWorker::new(
        feed.clone(),
        prefs(true, false),
        Arc::new(NoLocation),
        NotifierSet::new().with(notifier.clone()),
    );

    let first = worker.run_check().await;
    assert_eq!(first.report().unwrap().alerted.as_deref(), Some("A6.0"));
    assert_eq!(worker.dedup().last_alerted(), Some("A6.0"));

    // Unchanged feed: A is suppressed, B is the first differing id
    let second = worker.run_check().await;
    assert_eq!(second.report().unwrap().alerted.as_deref(), Some("B6.0"));

    assert_eq!(notifier.ids(), vec!["A6.0", "B6.0"]);
    let alerts = notifier.alerts.lock().unwrap();
    assert_eq!(alerts[0].title, "¡Sismo Significativo Detectado!");
    assert_eq!(alerts[0].body, "Magnitud 6.0 en Valparaíso");
}

#[tokio::test]
async fn test_single_report_alerts_once() {
    let feed = StaticFeed::ok(vec![raw("2024-11-25", "09:01", "Iquique", "6.8", "-20.2", "-70.1")]);
    let notifier = RecordingNotifier::new();
    let mut worker = QuakeWorker::new(
        feed,
        prefs(true, false),
        Arc::new(NoLocation),
        NotifierSet::new().with(notifier.clone()),
    );

    worker.run_check().await;
    let again = worker.run_check().await;
    assert!(again.report().unwrap().alerted.is_none());
    assert_eq!(notifier.ids().len(), 1);
}

#[tokio::test]
async fn test_opt_out_makes_no_calls() {
    let feed = StaticFeed::ok(two_strong_quakes());
    let notifier = RecordingNotifier::new();
    let mut worker = QuakeWorker::new(
        feed.clone(),
        prefs(false, true),
        Arc::new(FixedLocation(SANTIAGO)),
        NotifierSet::new().with(notifier.clone()),
    );

    let outcome = worker.run_check().await;
    let report = outcome.report().unwrap();
    assert!(report.skipped);
    assert_eq!(feed.calls(), 0);
    assert!(notifier.ids().is_empty());
    assert!(worker.dedup().last_alerted().is_none());
}

#[tokio::test]
async fn test_feed_failure_completes_without_alert() {
    let feed = StaticFeed::failing(503);
    let notifier = RecordingNotifier::new();
    let mut worker = QuakeWorker::new(
        feed.clone(),
        prefs(true, false),
        Arc::new(NoLocation),
        NotifierSet::new().with(notifier.clone()),
    );

    let outcome = worker.run_check().await;
    assert!(!outcome.is_retry());
    let report = outcome.report().unwrap();
    assert!(report.feed_error.as_ref().unwrap().contains("503"));
    assert!(report.alerted.is_none());
    assert_eq!(feed.calls(), 1);
    assert!(notifier.ids().is_empty());
}

#[tokio::test]
async fn test_delivery_failure_retries_without_marking() {
    let feed = StaticFeed::ok(two_strong_quakes());
    let notifier = RecordingNotifier::failing();
    let mut worker = QuakeWorker::new(
        feed,
        prefs(true, false),
        Arc::new(NoLocation),
        NotifierSet::new().with(notifier.clone()),
    );

    assert_eq!(worker.run_check().await, CheckOutcome::Retry);
    assert!(worker.dedup().last_alerted().is_none());

    // The retry attempts the same report again
    assert_eq!(worker.run_check().await, CheckOutcome::Retry);
    assert_eq!(notifier.ids(), vec!["A6.0", "A6.0"]);
}

#[tokio::test]
async fn test_panicking_collaborator_retries() {
    let mut worker = QuakeWorker::new(
        Arc::new(PanickingFeed),
        prefs(true, false),
        Arc::new(NoLocation),
        NotifierSet::new(),
    );
    assert!(worker.run_check().await.is_retry());
}

#[tokio::test]
async fn test_location_excludes_distant_quake() {
    // Antofagasta is ~1100 km from Santiago
    let feed = StaticFeed::ok(vec![
        raw("far", "", "Antofagasta", "6.0", "-23.65", "-70.40"),
        raw("near", "", "Valparaíso", "5.6", "-33.04", "-71.61"),
    ]);
    let notifier = RecordingNotifier::new();
    let mut worker = QuakeWorker::new(
        feed,
        prefs(true, true),
        Arc::new(FixedLocation(SANTIAGO)),
        NotifierSet::new().with(notifier.clone()),
    );

    let outcome = worker.run_check().await;
    let report = outcome.report().unwrap();
    assert_eq!(report.observer, Some(SANTIAGO));
    assert_eq!(report.fetched, 2);
    assert_eq!(report.relevant, 1);
    assert_eq!(notifier.ids(), vec!["near5.6"]);
}

#[tokio::test]
async fn test_location_disabled_falls_back_to_magnitude() {
    let feed = StaticFeed::ok(vec![raw("far", "", "Antofagasta", "6.0", "-23.65", "-70.40")]);
    let notifier = RecordingNotifier::new();
    let mut worker = QuakeWorker::new(
        feed,
        prefs(true, false),
        Arc::new(FixedLocation(SANTIAGO)),
        NotifierSet::new().with(notifier.clone()),
    );

    let outcome = worker.run_check().await;
    assert!(outcome.report().unwrap().observer.is_none());
    assert_eq!(notifier.ids(), vec!["far6.0"]);
}

#[tokio::test]
async fn test_malformed_magnitude_never_alerts() {
    let feed = StaticFeed::ok(vec![raw("x", "", "Desconocido", "N/A", "abc", "")]);
    let notifier = RecordingNotifier::new();
    let mut worker = QuakeWorker::new(
        feed,
        prefs(true, false),
        Arc::new(NoLocation),
        NotifierSet::new().with(notifier.clone()),
    )
    .with_relevance(RelevanceConfig {
        magnitude_threshold: 0.1,
    });

    let outcome = worker.run_check().await;
    assert_eq!(outcome.report().unwrap().relevant, 0);
    assert!(notifier.ids().is_empty());
}

#[tokio::test]
async fn test_configurable_threshold() {
    let feed = StaticFeed::ok(vec![raw("m", "", "Talca", "3.4", "0", "0")]);
    let notifier = RecordingNotifier::new();
    let mut low = QuakeWorker::new(
        feed.clone(),
        prefs(true, false),
        Arc::new(NoLocation),
        NotifierSet::new().with(notifier.clone()),
    )
    .with_relevance(RelevanceConfig {
        magnitude_threshold: 3.0,
    });
    assert_eq!(low.run_check().await.report().unwrap().relevant, 1);

    let mut default = QuakeWorker::new(feed, prefs(true, false), Arc::new(NoLocation), NotifierSet::new());
    assert_eq!(default.run_check().await.report().unwrap().relevant, 0);
}

#[tokio::test]
async fn test_fresh_worker_forgets_last_alert() {
    let feed = StaticFeed::ok(vec![raw("A", "", "Valparaíso", "6.0", "0", "0")]);
    let store = prefs(true, false);
    let notifier = RecordingNotifier::new();

    for _ in 0..2 {
        let mut worker = QuakeWorker::new(
            feed.clone(),
            store.clone(),
            Arc::new(NoLocation),
            NotifierSet::new().with(notifier.clone()),
        );
        worker.run_check().await;
    }
    assert_eq!(notifier.ids(), vec!["A6.0", "A6.0"]);
}

#[tokio::test]
async fn test_persisted_dedup_survives_recreation() {
    let feed = StaticFeed::ok(vec![raw("A", "", "Valparaíso", "6.0", "0", "0")]);
    let store = prefs(true, false);
    let notifier = RecordingNotifier::new();

    for _ in 0..2 {
        let mut worker = QuakeWorker::new(
            feed.clone(),
            store.clone(),
            Arc::new(NoLocation),
            NotifierSet::new().with(notifier.clone()),
        )
        .with_persisted_dedup(true);
        worker.run_check().await;
    }
    assert_eq!(notifier.ids(), vec!["A6.0"]);
    assert_eq!(store.last_alerted_id().unwrap().as_deref(), Some("A6.0"));
}

#[tokio::test]
async fn test_injected_dedup_state() {
    let feed = StaticFeed::ok(two_strong_quakes());
    let notifier = RecordingNotifier::new();
    let mut worker = QuakeWorker::new(
        feed,
        prefs(true, false),
        Arc::new(NoLocation),
        NotifierSet::new().with(notifier.clone()),
    )
    .with_dedup(AlertDedupState::restore(Some("A6.0".to_string())));

    worker.run_check().await;
    assert_eq!(notifier.ids(), vec!["B6.0"]);
}

#[tokio::test]
async fn test_opt_out_from_another_process_stops_checks() {
    use quake_watch::prefs::FilePreferences;

    let dir = tempfile::tempdir().unwrap();
    let daemon_store = Arc::new(FilePreferences::in_dir(dir.path()).unwrap());
    daemon_store.set_notifications_enabled(true).unwrap();

    let feed = StaticFeed::ok(two_strong_quakes());
    let notifier = RecordingNotifier::new();
    let mut worker = QuakeWorker::new(
        feed.clone(),
        daemon_store.clone(),
        Arc::new(NoLocation),
        NotifierSet::new().with(notifier.clone()),
    );

    // `quake-watch disable` opens its own store on the same directory
    FilePreferences::in_dir(dir.path())
        .unwrap()
        .set_notifications_enabled(false)
        .unwrap();

    let outcome = worker.run_check().await;
    assert!(outcome.report().unwrap().skipped);
    assert_eq!(feed.calls(), 0);
    assert!(notifier.ids().is_empty());
}
