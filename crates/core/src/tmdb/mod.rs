//! Client for the api.themoviedb.org movie metadata service.
//!
//! The service enforces roughly 40 requests per 10 seconds, so every
//! operation passes through a shared [`RateGate`] before touching the
//! network. Callers are expected to back off and retry on
//! [`TmdbError::RateLimit`].

mod client;
mod rate_limit;

pub use client::TmdbClient;
pub use rate_limit::{RateGate, API_RATE_LIMIT, API_RATE_WINDOW, RATE_LIMIT_PAUSE};

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::jsonscan::JsonScanError;

/// Highest `/movie/changes` page the seeker will walk. The feed repeats
/// after a while; anything beyond this is stale churn.
pub const CHANGED_MOVIES_MAX_PAGE: u32 = 1000;

/// Ceiling on the daily export archive.
pub const DAILY_EXPORT_MAX_SIZE: u64 = 50 * 1024 * 1024;

/// Errors surfaced by the TMDB client.
#[derive(Debug, Error)]
pub enum TmdbError {
    /// The shared request budget is exhausted; retry after a pause.
    #[error("TMDB rate limit exceeded")]
    RateLimit,

    /// The requested page is past the last one.
    #[error("page is out of range")]
    Page,

    /// `configure()` has not succeeded yet.
    #[error("TMDB client is not configured")]
    Configure,

    /// Non-success HTTP status from the API.
    #[error("TMDB API error: status {status}")]
    Api { status: u16 },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to extract response fields: {0}")]
    Scan(#[from] JsonScanError),

    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Downloaded poster bytes are neither JPEG nor PNG.
    #[error("poster image rejected: {0}")]
    ImageDecode(String),

    #[error("daily export is larger than {DAILY_EXPORT_MAX_SIZE} bytes")]
    ExportTooLarge,

    #[error("daily export has no usable Content-Length")]
    ExportLength,

    #[error("daily export size does not match the announced Content-Length")]
    ExportSizeMismatch,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A movie as assembled from `/movie/{id}`.
#[derive(Debug, Clone, Default)]
pub struct Movie {
    pub tmdb_id: u32,
    pub imdb_id: Option<String>,
    pub original_title: String,
    pub original_lang: String,
    pub adult: bool,
    /// `None` when the release date is missing or unparseable; such movies
    /// are treated as released in the distant past.
    pub release_date: Option<NaiveDate>,
    pub vote_count: u32,
    pub vote_average: f64,
    pub collection: Option<Collection>,
    /// Title per language: the original first, then supported-language
    /// translations that do not collide with it.
    pub titles: HashMap<String, String>,
    /// Best-voted poster per supported language.
    pub posters: HashMap<String, PosterRef>,
}

impl Movie {
    /// Collection id with 0 meaning "standalone movie".
    pub fn collection_id(&self) -> i64 {
        self.collection.as_ref().map_or(0, |c| c.id)
    }
}

/// The franchise grouping a movie belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    pub id: i64,
    pub name: String,
}

/// Reference to one poster image, prior to downloading its bytes.
#[derive(Debug, Clone)]
pub struct PosterRef {
    pub lang: String,
    pub path: String,
    pub vote_average: f64,
}

/// One line of the daily export, and one entry of a now-playing page.
#[derive(Debug, Clone, Deserialize)]
pub struct MovieBrief {
    pub id: u32,
    #[serde(default)]
    pub original_title: Option<String>,
}

/// The movie-service operations the harvester depends on. Production code
/// uses [`TmdbClient`]; tests substitute a scripted implementation.
#[async_trait]
pub trait MovieApi: Send + Sync {
    /// Fetch the image CDN settings. Must succeed once before
    /// [`MovieApi::get_poster`] is usable.
    async fn configure(&self) -> Result<(), TmdbError>;

    /// Download the gzipped NDJSON id export for `date` into `dest`.
    /// On failure no file is left behind.
    async fn get_daily_export(&self, date: NaiveDate, dest: &Path) -> Result<(), TmdbError>;

    /// Fetch one movie with its translations and poster references.
    async fn get_movie(&self, tmdb_id: u32) -> Result<Movie, TmdbError>;

    /// One page of movies currently in theatres.
    async fn get_now_playing(&self, page: u32) -> Result<Vec<MovieBrief>, TmdbError>;

    /// One page of ids changed during the previous UTC day.
    async fn get_changed_movies(&self, page: u32) -> Result<Vec<u32>, TmdbError>;

    /// Download poster bytes; guaranteed to decode as JPEG or PNG.
    async fn get_poster(&self, path: &str) -> Result<Vec<u8>, TmdbError>;
}
