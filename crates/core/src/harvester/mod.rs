//! The harvester: keeps the local catalog fed from the movie service.
//!
//! One cycle per UTC day. The seeker produces candidate ids from the daily
//! export and the change feed; a small pool of crawlers drains them,
//! fetches metadata and posters, and writes one transaction per movie. The
//! seeker owns the channel, so a closed channel is the crawlers' signal to
//! exit.

mod crawler;
mod seeker;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, Utc};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::config::HarvesterConfig;
use crate::tmdb::MovieApi;

/// Attempts per HTTP operation before a candidate is given up on.
const TMDB_MAX_RETRIES: u32 = 3;

/// Drives daily harvest cycles until shutdown.
pub struct Harvester {
    api: Arc<dyn MovieApi>,
    db_path: PathBuf,
    config: HarvesterConfig,
}

impl Harvester {
    pub fn new(api: Arc<dyn MovieApi>, db_path: PathBuf, config: HarvesterConfig) -> Self {
        Self { api, db_path, config }
    }

    /// Run cycles until the shutdown signal fires. Between cycles the
    /// image configuration is refreshed, as the service recommends doing
    /// every few days; a failure there keeps the previous configuration.
    pub async fn run(&self, shutdown: broadcast::Sender<()>) {
        info!("harvester started");
        // Subscribed up front so a signal fired during a cycle is still
        // waiting when the cycle ends.
        let mut shutdown_rx = shutdown.subscribe();
        loop {
            info!("starting movie harvest cycle");
            self.run_cycle(&shutdown).await;
            info!("movie harvest cycle finished");

            let pause = until_next_utc_midnight();
            info!(seconds = pause.as_secs(), "sleeping until the next UTC day");
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("harvester sleep cancelled");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }

            if let Err(e) = self.api.configure().await {
                error!("image configuration refresh failed: {e}");
            }
        }
        info!("harvester finished");
    }

    /// One seeker plus the configured crawler pool, awaited to completion.
    pub async fn run_cycle(&self, shutdown: &broadcast::Sender<()>) {
        let (tx, rx) = mpsc::channel::<u32>(1);
        let rx = Arc::new(Mutex::new(rx));

        let mut tasks = JoinSet::new();
        tasks.spawn(seeker::run_seeker(
            Arc::clone(&self.api),
            self.db_path.clone(),
            self.config.supported_languages.clone(),
            tx,
            shutdown.subscribe(),
        ));
        for i in 1..=self.config.crawlers {
            tasks.spawn(crawler::run_crawler(
                format!("crawler-{i}"),
                Arc::clone(&self.api),
                self.db_path.clone(),
                self.config.clone(),
                Arc::clone(&rx),
            ));
        }

        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                error!("harvester task panicked: {e}");
            }
        }
    }
}

fn until_next_utc_midnight() -> Duration {
    let now = Utc::now();
    let next_day = now.date_naive() + Days::new(1);
    let midnight = next_day.and_hms_opt(0, 0, 0).unwrap().and_utc();
    (midnight - now).to_std().unwrap_or(Duration::ZERO)
}
