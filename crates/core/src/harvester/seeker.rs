//! Single producer of candidate movie ids.
//!
//! Two sources per cycle: the gzipped NDJSON daily export (new movies) and
//! the `/movie/changes` feed (movies whose posters may have appeared).
//! Closing the channel, on completion or cancellation, ends the crawlers.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Days, Utc};
use flate2::read::GzDecoder;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, trace};

use super::TMDB_MAX_RETRIES;
use crate::catalog::{retry_busy, Catalog};
use crate::metrics;
use crate::tmdb::{MovieApi, MovieBrief, TmdbError, CHANGED_MOVIES_MAX_PAGE, RATE_LIMIT_PAUSE};

/// Whether a phase ran to its end or was cut short by cancellation.
#[derive(PartialEq)]
enum Flow {
    Continue,
    Cancelled,
}

enum PageFetch {
    Ids(Vec<u32>),
    End,
    Failed,
    Cancelled,
}

pub(super) async fn run_seeker(
    api: Arc<dyn MovieApi>,
    db_path: PathBuf,
    supported_langs: Vec<String>,
    tx: mpsc::Sender<u32>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("seeker started");
    // `tx` is moved in here, so every return closes the channel.

    let catalog = match Catalog::open(&db_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("seeker cannot open the catalog: {e}");
            return;
        }
    };

    // The export archive lives in a temp dir that cleans up after itself.
    let workdir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => {
            error!("seeker cannot create a work directory: {e}");
            return;
        }
    };
    let export_path = workdir.path().join("movie_ids.json.gz");

    if download_export(api.as_ref(), &export_path).await
        && process_export(&catalog, &export_path, &tx, &mut shutdown).await == Flow::Cancelled
    {
        info!("seeker cancelled during export processing");
        return;
    }

    if process_changes(api.as_ref(), &catalog, &supported_langs, &tx, &mut shutdown).await
        == Flow::Cancelled
    {
        info!("seeker cancelled during changes processing");
        return;
    }

    info!("seeker finished");
}

/// Try the five previous UTC days, most recent first, and stop at the
/// first export that downloads.
async fn download_export(api: &dyn MovieApi, dest: &Path) -> bool {
    let today = Utc::now().date_naive();
    for days_back in 1..=5 {
        let date = today - Days::new(days_back);
        info!(%date, "downloading daily export");
        match api.get_daily_export(date, dest).await {
            Ok(()) => {
                info!(%date, "daily export downloaded");
                return true;
            }
            Err(e) => error!(%date, "daily export download failed: {e}"),
        }
    }
    error!("no daily export available for any of the 5 previous days");
    false
}

/// Stream the gzipped NDJSON export and emit every id the catalog does not
/// know yet.
async fn process_export(
    catalog: &Catalog,
    export_path: &Path,
    tx: &mpsc::Sender<u32>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Flow {
    let file = match File::open(export_path) {
        Ok(file) => file,
        Err(e) => {
            error!("cannot open the daily export: {e}");
            return Flow::Continue;
        }
    };
    let reader = BufReader::new(GzDecoder::new(file));

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!("daily export read failed: {e}");
                return Flow::Continue;
            }
        };

        let brief: MovieBrief = match serde_json::from_str(&line) {
            Ok(brief) => brief,
            Err(_) => continue,
        };
        if brief.id == 0 {
            continue;
        }

        let known = match retry_busy(|| catalog.movie_db_id(brief.id)).await {
            Ok(known) => known.is_some(),
            Err(e) => {
                error!("catalog lookup failed: {e}");
                continue;
            }
        };
        if known {
            trace!(tmdb_id = brief.id, "movie is already in the catalog, skipping");
            continue;
        }

        if emit(tx, shutdown, brief.id).await == Flow::Cancelled {
            return Flow::Cancelled;
        }
    }

    Flow::Continue
}

/// Walk the change feed and re-emit ids whose stored posters do not yet
/// cover every supported language.
async fn process_changes(
    api: &dyn MovieApi,
    catalog: &Catalog,
    supported_langs: &[String],
    tx: &mpsc::Sender<u32>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Flow {
    info!("processing changed movies");

    for page in 1..=CHANGED_MOVIES_MAX_PAGE {
        if !matches!(shutdown.try_recv(), Err(broadcast::error::TryRecvError::Empty)) {
            return Flow::Cancelled;
        }

        let ids = match fetch_changes_page(api, page, shutdown).await {
            PageFetch::Ids(ids) => ids,
            PageFetch::End => break,
            PageFetch::Failed => continue,
            PageFetch::Cancelled => return Flow::Cancelled,
        };

        for tmdb_id in ids {
            let langs = match retry_busy(|| catalog.poster_langs(tmdb_id)).await {
                Ok(langs) => langs,
                Err(e) => {
                    error!("catalog lookup failed: {e}");
                    continue;
                }
            };
            let complete = supported_langs.iter().all(|lang| langs.contains(lang));
            if complete {
                trace!(tmdb_id, "all posters already stored, skipping");
                continue;
            }

            if emit(tx, shutdown, tmdb_id).await == Flow::Cancelled {
                return Flow::Cancelled;
            }
        }
    }

    info!("changed movies processing end");
    Flow::Continue
}

async fn fetch_changes_page(
    api: &dyn MovieApi,
    page: u32,
    shutdown: &mut broadcast::Receiver<()>,
) -> PageFetch {
    for attempt in 1..=TMDB_MAX_RETRIES {
        trace!(page, attempt, "fetching changed movies page");
        match api.get_changed_movies(page).await {
            Ok(ids) => {
                info!(page, count = ids.len(), "changed movies page fetched");
                return PageFetch::Ids(ids);
            }
            Err(TmdbError::Page) => return PageFetch::End,
            Err(TmdbError::RateLimit) => {
                if attempt == TMDB_MAX_RETRIES {
                    error!(page, "changed movies page fetch failed");
                    return PageFetch::Failed;
                }
                info!(
                    "rate limit exceeded, sleeping for {} sec",
                    RATE_LIMIT_PAUSE.as_secs()
                );
                tokio::select! {
                    _ = shutdown.recv() => return PageFetch::Cancelled,
                    _ = tokio::time::sleep(RATE_LIMIT_PAUSE) => {}
                }
            }
            Err(e) => {
                error!(page, "changed movies page fetch error: {e}");
                return PageFetch::Failed;
            }
        }
    }
    PageFetch::Failed
}

/// Send one id downstream, unless cancellation wins first.
async fn emit(
    tx: &mpsc::Sender<u32>,
    shutdown: &mut broadcast::Receiver<()>,
    tmdb_id: u32,
) -> Flow {
    tokio::select! {
        sent = tx.send(tmdb_id) => match sent {
            Ok(()) => {
                metrics::MOVIES_EMITTED.inc();
                Flow::Continue
            }
            Err(_) => Flow::Cancelled,
        },
        _ = shutdown.recv() => Flow::Cancelled,
    }
}
