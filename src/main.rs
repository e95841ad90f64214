use clap::{Parser, Subcommand, ValueEnum};
use quake_watch::feed::{self, EarthquakeFeed, HttpFeed};
use quake_watch::location::{self, LocationProvider};
use quake_watch::model::{find_by_id, FeedSummary};
use quake_watch::notify::NotifierSet;
use quake_watch::prefs::{FilePreferences, PreferenceStore};
use quake_watch::scheduler::{MonitoringControl, Scheduler, TcpProbe, WorkerFactory};
use quake_watch::settings::Settings;
use quake_watch::web::{self, CheckHistory, WebState};
use quake_watch::worker::{CheckOutcome, QuakeWorker};
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML or YAML). Defaults to ~/.quake-watch/settings.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the effective settings to this path and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the periodic monitor (and the JSON API when enabled)
    Run,
    /// Run a single check now
    Check,
    /// Print recent earthquakes
    List,
    /// Print statistics over the recent feed
    Stats,
    /// Show one earthquake by id
    Show { id: String },
    /// Turn alert notifications on
    Enable,
    /// Turn alert notifications off
    Disable,
    /// Allow or forbid use of the configured location
    Location { state: Switch },
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

struct Parts {
    feed: Arc<dyn EarthquakeFeed>,
    prefs: Arc<dyn PreferenceStore>,
    location: Arc<dyn LocationProvider>,
    notifiers: NotifierSet,
}

impl Parts {
    fn build(settings: &Settings) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            feed: Arc::new(HttpFeed::from_settings(&settings.feed)?),
            prefs: Arc::new(FilePreferences::in_dir(&settings.settings.data_dir)?),
            location: Arc::from(location::from_settings(&settings.location)),
            notifiers: NotifierSet::from_settings(settings),
        })
    }

    fn worker(&self, settings: &Settings) -> QuakeWorker {
        QuakeWorker::from_settings(
            settings,
            self.feed.clone(),
            self.prefs.clone(),
            self.location.clone(),
            self.notifiers.clone(),
        )
    }

    fn observer(&self) -> Result<Option<quake_watch::ObserverLocation>, Box<dyn Error>> {
        Ok(if self.prefs.location_enabled()? {
            self.location.last_known()
        } else {
            None
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.clone())?;

    let default_level = if settings.settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    if let Some(path) = cli.dump_config {
        let format = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
        std::fs::write(&path, settings.dump(format)?)?;
        tracing::info!("Settings written to {:?}", path);
        return Ok(());
    }

    let parts = Parts::build(&settings)?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(settings, parts).await?,
        Commands::Check => {
            let mut worker = parts.worker(&settings);
            match worker.run_check().await {
                CheckOutcome::Completed(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                CheckOutcome::Retry => return Err("check failed, retry later".into()),
            }
        }
        Commands::List => {
            let reports = feed::fetch_reports(parts.feed.as_ref(), settings.feed.id_scheme).await?;
            let observer = parts.observer()?;
            for (i, r) in reports.iter().enumerate() {
                println!("{}. M{:.1} {} ({} {})", i + 1, r.magnitude, r.place, r.date, r.hour);
                print!("   depth {} km, severity {}", r.depth, r.severity().as_str());
                if let Some(o) = &observer {
                    print!(
                        ", {:.0} km away{}",
                        r.distance_to(o),
                        if r.is_perceptible_at(o) { ", likely felt" } else { "" }
                    );
                }
                println!();
                println!("   ID: {}", r.id);
            }
        }
        Commands::Stats => {
            let reports = feed::fetch_reports(parts.feed.as_ref(), settings.feed.id_scheme).await?;
            println!("{}", serde_json::to_string_pretty(&FeedSummary::from_reports(&reports))?);
        }
        Commands::Show { id } => {
            let reports = feed::fetch_reports(parts.feed.as_ref(), settings.feed.id_scheme).await?;
            match find_by_id(&reports, &id) {
                Some(r) => {
                    println!("{}", serde_json::to_string_pretty(r)?);
                    let advisory = r.advisory();
                    println!("\n{}", advisory.title());
                    for line in advisory.advice() {
                        println!("• {}", line);
                    }
                }
                None => return Err(format!("No earthquake with id {}", id).into()),
            }
        }
        Commands::Enable => {
            parts.prefs.set_notifications_enabled(true)?;
            println!("Notifications enabled");
        }
        Commands::Disable => {
            parts.prefs.set_notifications_enabled(false)?;
            println!("Notifications disabled");
        }
        Commands::Location { state } => {
            let enabled = matches!(state, Switch::On);
            parts.prefs.set_location_enabled(enabled)?;
            println!("Location use {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    Ok(())
}

async fn run(settings: Settings, parts: Parts) -> Result<(), Box<dyn Error>> {
    let scheduler = Arc::new(Scheduler::new());
    let history = Arc::new(Mutex::new(CheckHistory::new(100)));
    let (outcome_tx, outcome_rx) = mpsc::channel(32);
    web::history::spawn_recorder(history.clone(), outcome_rx);

    let factory: WorkerFactory = {
        let settings = settings.clone();
        let feed = parts.feed.clone();
        let prefs = parts.prefs.clone();
        let location = parts.location.clone();
        let notifiers = parts.notifiers.clone();
        Arc::new(move || {
            QuakeWorker::from_settings(&settings, feed.clone(), prefs.clone(), location.clone(), notifiers.clone())
        })
    };

    let monitoring = Arc::new(
        MonitoringControl::new(
            scheduler.clone(),
            parts.prefs.clone(),
            factory,
            Arc::new(TcpProbe::from_settings(&settings.scheduler)),
            &settings.scheduler,
        )
        .with_outcomes(outcome_tx),
    );

    if !monitoring.resume()? {
        tracing::warn!("Notifications are disabled; run `quake-watch enable` to start monitoring");
    }

    let shutdown = CancellationToken::new();
    monitoring.clone().spawn_watch(
        std::time::Duration::from_secs(settings.scheduler.watch_secs),
        shutdown.clone(),
    );

    if settings.web.enabled {
        let state = WebState::new(
            parts.feed.clone(),
            settings.feed.id_scheme,
            parts.prefs.clone(),
            parts.location.clone(),
        )
        .with_monitoring(monitoring.clone())
        .with_history(history.clone());

        let bind = settings.web.bind.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = web::serve(&bind, state, async move { token.cancelled().await }).await {
                tracing::error!("JSON API error: {}", e);
            }
        });
    }

    shutdown_signal().await;
    shutdown.cancel();
    scheduler.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping monitor...");
}
