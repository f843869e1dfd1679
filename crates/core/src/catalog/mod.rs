//! Movie catalog - the persistent store the harvester fills and the
//! matcher reads.
//!
//! Every task opens its own [`Catalog`] handle; handles are never shared
//! between tasks, but each one is usable across await points. Writes for
//! one movie happen inside a single transaction, so readers and other
//! writers only ever observe complete movies.

mod sqlite;

pub use sqlite::Catalog;

use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::tmdb::Movie;

/// How long a caller sleeps before retrying a contended statement.
pub const CONTENTION_PAUSE: Duration = Duration::from_secs(1);

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(String),

    /// The database is locked by another writer; retry after
    /// [`CONTENTION_PAUSE`].
    #[error("database is busy")]
    Busy,

    #[error("not found: {0}")]
    NotFound(String),
}

/// Description columns of the `movie` table.
#[derive(Debug, Clone)]
pub struct MovieUpsert {
    pub tmdb_id: u32,
    pub original_title: String,
    pub original_lang: String,
    pub released_on: Option<NaiveDate>,
    pub adult: bool,
    pub imdb_id: Option<String>,
    pub vote_count: u32,
    pub vote_average: f64,
    /// 0 for standalone movies.
    pub collection_id: i64,
}

impl From<&Movie> for MovieUpsert {
    fn from(movie: &Movie) -> Self {
        Self {
            tmdb_id: movie.tmdb_id,
            original_title: movie.original_title.clone(),
            original_lang: movie.original_lang.clone(),
            released_on: movie.release_date,
            adult: movie.adult,
            imdb_id: movie.imdb_id.clone(),
            vote_count: movie.vote_count,
            vote_average: movie.vote_average,
            collection_id: movie.collection_id(),
        }
    }
}

/// One poster row bound for `movie_detail`.
#[derive(Debug, Clone)]
pub struct PosterInsert {
    pub lang: String,
    pub title: String,
    pub image: Vec<u8>,
}

/// Row of the title listing consumed by the matcher's incremental loader.
#[derive(Debug, Clone)]
pub struct TitleRow {
    /// `movie_detail.id`, the key callback buttons carry.
    pub id: i64,
    pub title: String,
    pub released_on: Option<NaiveDate>,
    pub collection_id: i64,
}

/// Catalog size counters, surfaced on the health endpoint.
#[derive(Debug, Clone, Copy)]
pub struct CatalogStats {
    pub movies: u64,
    pub posters: u64,
}

/// Run `op`, sleeping [`CONTENTION_PAUSE`] and retrying while it reports
/// [`CatalogError::Busy`]. Other outcomes pass through. The pause yields
/// to the runtime, so sibling tasks keep making progress.
pub async fn retry_busy<T>(
    mut op: impl FnMut() -> Result<T, CatalogError>,
) -> Result<T, CatalogError> {
    loop {
        match op() {
            Err(CatalogError::Busy) => {
                tracing::warn!("catalog is busy, retrying in {:?}", CONTENTION_PAUSE);
                tokio::time::sleep(CONTENTION_PAUSE).await;
            }
            other => return other,
        }
    }
}
