//! One crawler worker: drains candidate ids, fetches metadata and posters,
//! writes one transaction per movie.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, trace};

use super::TMDB_MAX_RETRIES;
use crate::catalog::{retry_busy, Catalog, MovieUpsert, PosterInsert};
use crate::config::HarvesterConfig;
use crate::metrics;
use crate::tmdb::{Movie, MovieApi, TmdbError, RATE_LIMIT_PAUSE};

pub(super) async fn run_crawler(
    name: String,
    api: Arc<dyn MovieApi>,
    db_path: PathBuf,
    config: HarvesterConfig,
    rx: Arc<Mutex<mpsc::Receiver<u32>>>,
) {
    info!(crawler = %name, "started");

    let catalog = match Catalog::open(&db_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!(crawler = %name, "cannot open the catalog: {e}");
            return;
        }
    };

    loop {
        // The lock is held only for the duration of one recv, so the
        // workers take turns pulling from the shared channel.
        let tmdb_id = { rx.lock().await.recv().await };
        let Some(tmdb_id) = tmdb_id else { break };

        crawl_one(&name, api.as_ref(), &catalog, &config, tmdb_id).await;
    }

    info!(crawler = %name, "finished");
}

/// Fetch, classify and store a single movie. Failures are logged and the
/// id is simply left for a future cycle to rediscover.
async fn crawl_one(
    name: &str,
    api: &dyn MovieApi,
    catalog: &Catalog,
    config: &HarvesterConfig,
    tmdb_id: u32,
) {
    let Some(movie) = fetch_movie(name, api, tmdb_id).await else {
        return;
    };

    // Future-dated movies come back through the change feed once released.
    if let Some(date) = movie.release_date {
        if date > Utc::now().date_naive() {
            info!(crawler = %name, tmdb_id, "movie is not released yet, skip");
            return;
        }
    }

    let popular = if movie.original_lang == "ru" {
        movie.vote_count >= config.min_vote_count_ru
    } else {
        movie.vote_count >= config.min_vote_count
    };

    let posters = if popular {
        fetch_missing_posters(name, api, catalog, &movie).await
    } else {
        trace!(crawler = %name, tmdb_id, "movie is low voted, skip posters fetching");
        Vec::new()
    };

    let upsert = MovieUpsert::from(&movie);
    match retry_busy(|| catalog.store_crawled(&upsert, &posters)).await {
        Ok(()) => {
            metrics::MOVIES_STORED.inc();
            info!(crawler = %name, tmdb_id, posters = posters.len(), "movie stored");
        }
        Err(e) => {
            error!(crawler = %name, tmdb_id, "storing movie failed, rolled back: {e}");
        }
    }
}

async fn fetch_movie(name: &str, api: &dyn MovieApi, tmdb_id: u32) -> Option<Movie> {
    for attempt in 1..=TMDB_MAX_RETRIES {
        trace!(crawler = %name, tmdb_id, attempt, "fetching movie");
        match api.get_movie(tmdb_id).await {
            Ok(movie) => {
                metrics::MOVIES_FETCHED.with_label_values(&["ok"]).inc();
                info!(crawler = %name, tmdb_id, "movie fetched");
                return Some(movie);
            }
            Err(TmdbError::RateLimit) => {
                metrics::MOVIES_FETCHED.with_label_values(&["rate_limited"]).inc();
                if attempt == TMDB_MAX_RETRIES {
                    error!(crawler = %name, tmdb_id, "movie fetch failed");
                    return None;
                }
                info!(
                    crawler = %name,
                    "rate limit exceeded, sleeping for {} sec",
                    RATE_LIMIT_PAUSE.as_secs()
                );
                tokio::time::sleep(RATE_LIMIT_PAUSE).await;
            }
            Err(e) => {
                metrics::MOVIES_FETCHED.with_label_values(&["error"]).inc();
                error!(crawler = %name, tmdb_id, "movie fetch error: {e}");
                return None;
            }
        }
    }
    None
}

/// Download posters for every supported language that has a non-empty
/// title and no stored row yet. Each poster stands on its own: one that
/// fails after its retries is simply left for a later cycle, while the
/// rest still reach the transaction.
async fn fetch_missing_posters(
    name: &str,
    api: &dyn MovieApi,
    catalog: &Catalog,
    movie: &Movie,
) -> Vec<PosterInsert> {
    let tmdb_id = movie.tmdb_id;
    let stored = match retry_busy(|| catalog.poster_langs(tmdb_id)).await {
        Ok(stored) => stored,
        Err(e) => {
            error!(crawler = %name, tmdb_id, "stored poster lookup failed: {e}");
            return Vec::new();
        }
    };

    let mut posters = Vec::new();
    for (lang, poster) in &movie.posters {
        let title = match movie.titles.get(lang) {
            Some(title) if !title.is_empty() => title.clone(),
            _ => {
                trace!(crawler = %name, tmdb_id, lang, "no title for poster, skip fetching it");
                continue;
            }
        };
        if stored.contains(lang) {
            trace!(crawler = %name, tmdb_id, lang, "poster is already stored, skip fetching it");
            continue;
        }

        let Some(image) = fetch_poster(name, api, tmdb_id, lang, &poster.path).await else {
            continue;
        };
        posters.push(PosterInsert { lang: lang.clone(), title, image });
    }
    posters
}

async fn fetch_poster(
    name: &str,
    api: &dyn MovieApi,
    tmdb_id: u32,
    lang: &str,
    path: &str,
) -> Option<Vec<u8>> {
    for attempt in 1..=TMDB_MAX_RETRIES {
        trace!(crawler = %name, tmdb_id, lang, attempt, "fetching poster");
        match api.get_poster(path).await {
            Ok(image) => {
                metrics::POSTERS_FETCHED.with_label_values(&["ok"]).inc();
                info!(crawler = %name, tmdb_id, lang, "poster fetched");
                return Some(image);
            }
            Err(TmdbError::RateLimit) => {
                metrics::POSTERS_FETCHED.with_label_values(&["rate_limited"]).inc();
                if attempt == TMDB_MAX_RETRIES {
                    error!(crawler = %name, tmdb_id, lang, "poster fetch failed");
                    return None;
                }
                info!(
                    crawler = %name,
                    "rate limit exceeded, sleeping for {} sec",
                    RATE_LIMIT_PAUSE.as_secs()
                );
                tokio::time::sleep(RATE_LIMIT_PAUSE).await;
            }
            Err(e) => {
                metrics::POSTERS_FETCHED.with_label_values(&["error"]).inc();
                error!(crawler = %name, tmdb_id, lang, "poster fetch error: {e}");
                return None;
            }
        }
    }
    None
}
