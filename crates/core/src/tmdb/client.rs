//! Production TMDB client.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Days, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::rate_limit::RateGate;
use super::{
    Collection, Movie, MovieApi, MovieBrief, PosterRef, TmdbError, DAILY_EXPORT_MAX_SIZE,
};
use crate::jsonscan::Scanner;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// TMDB API client. One instance is shared by every task that talks to the
/// service, so the rate gate and the image configuration are process-wide.
pub struct TmdbClient {
    key: String,
    http: Client,
    api_base_url: String,
    export_base_url: String,
    image: RwLock<Option<ImageConfig>>,
    gate: RateGate,
    supported_langs: HashSet<String>,
}

/// Image CDN settings picked up by `configure()`.
#[derive(Debug, Clone)]
struct ImageConfig {
    base_url: String,
    poster_size: String,
}

impl TmdbClient {
    /// Create a client for the given API key and supported language set.
    pub fn new(key: impl Into<String>, supported_langs: &[String]) -> Result<Self, TmdbError> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            key: key.into(),
            http,
            api_base_url: "https://api.themoviedb.org/3".to_string(),
            export_base_url: "http://files.tmdb.org/p/exports".to_string(),
            image: RwLock::new(None),
            gate: RateGate::tmdb(),
            supported_langs: supported_langs.iter().cloned().collect(),
        })
    }

    /// Point the client at different hosts (stub servers in tests).
    pub fn with_base_urls(
        mut self,
        api_base_url: impl Into<String>,
        export_base_url: impl Into<String>,
    ) -> Self {
        self.api_base_url = api_base_url.into();
        self.export_base_url = export_base_url.into();
        self
    }

    fn admit(&self) -> Result<(), TmdbError> {
        self.gate.try_admit().map_err(|_| TmdbError::RateLimit)
    }

    fn check_status(status: StatusCode) -> Result<(), TmdbError> {
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TmdbError::RateLimit);
        }
        if !status.is_success() {
            return Err(TmdbError::Api { status: status.as_u16() });
        }
        Ok(())
    }
}

#[async_trait]
impl MovieApi for TmdbClient {
    async fn configure(&self) -> Result<(), TmdbError> {
        self.admit()?;
        let url = format!("{}/configuration", self.api_base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[("api_key", &self.key)])
            .send()
            .await?;
        Self::check_status(resp.status())?;

        let config: ConfigurationResponse = resp
            .json()
            .await
            .map_err(|e| TmdbError::Parse(e.to_string()))?;

        let poster_size = select_poster_size(&config.images.poster_sizes).to_string();
        debug!(
            base_url = %config.images.base_url,
            %poster_size,
            "image configuration updated"
        );
        *self.image.write().unwrap() = Some(ImageConfig {
            base_url: config.images.base_url,
            poster_size,
        });
        Ok(())
    }

    async fn get_daily_export(&self, date: NaiveDate, dest: &Path) -> Result<(), TmdbError> {
        self.admit()?;
        let url = export_url(&self.export_base_url, date);
        debug!(%url, "downloading daily export");

        let resp = self.http.get(&url).send().await?;
        Self::check_status(resp.status())?;

        let announced = resp.content_length().ok_or(TmdbError::ExportLength)?;
        if announced > DAILY_EXPORT_MAX_SIZE {
            return Err(TmdbError::ExportTooLarge);
        }

        let written = write_export(resp, dest).await;
        match written {
            Ok(written) if written == announced => Ok(()),
            Ok(_) => {
                let _ = tokio::fs::remove_file(dest).await;
                Err(TmdbError::ExportSizeMismatch)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }

    async fn get_movie(&self, tmdb_id: u32) -> Result<Movie, TmdbError> {
        self.admit()?;
        let url = format!("{}/movie/{}", self.api_base_url, tmdb_id);
        debug!(tmdb_id, "fetching movie");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("api_key", self.key.as_str()),
                ("append_to_response", "translations,images"),
            ])
            .send()
            .await?;
        Self::check_status(resp.status())?;

        let body = resp.bytes().await?;
        parse_movie(&body, &self.supported_langs)
    }

    async fn get_now_playing(&self, page: u32) -> Result<Vec<MovieBrief>, TmdbError> {
        self.admit()?;
        let url = format!("{}/movie/now_playing", self.api_base_url);
        let page_param = page.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[("api_key", &self.key), ("page", &page_param)])
            .send()
            .await?;
        Self::check_status(resp.status())?;

        let body = resp.bytes().await?;
        let (movies, total_pages) = parse_now_playing(&body)?;
        if page > total_pages {
            return Err(TmdbError::Page);
        }
        Ok(movies)
    }

    async fn get_changed_movies(&self, page: u32) -> Result<Vec<u32>, TmdbError> {
        self.admit()?;
        let url = format!("{}/movie/changes", self.api_base_url);
        let end = Utc::now().date_naive();
        let start = end - Days::new(1);
        let page_param = page.to_string();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("api_key", &self.key),
                ("page", &page_param),
                ("start_date", &start.format("%Y-%m-%d").to_string()),
                ("end_date", &end.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await?;
        Self::check_status(resp.status())?;

        let body = resp.bytes().await?;
        let (ids, total_pages) = parse_changed_movies(&body)?;
        if page > total_pages {
            return Err(TmdbError::Page);
        }
        Ok(ids)
    }

    async fn get_poster(&self, path: &str) -> Result<Vec<u8>, TmdbError> {
        let image = self
            .image
            .read()
            .unwrap()
            .clone()
            .ok_or(TmdbError::Configure)?;

        self.admit()?;
        let base = image.base_url.trim_end_matches('/');
        let url = format!("{}/{}{}", base, image.poster_size, path);
        debug!(%path, "fetching poster");

        let resp = self.http.get(&url).send().await?;
        Self::check_status(resp.status())?;

        let bytes = resp.bytes().await?.to_vec();
        validate_poster(&bytes)?;
        Ok(bytes)
    }
}

// ============================================================================
// Response parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct ConfigurationResponse {
    images: ImagesSection,
}

#[derive(Debug, Deserialize)]
struct ImagesSection {
    base_url: String,
    poster_sizes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TranslationEntry {
    iso_639_1: String,
    data: TranslationData,
}

#[derive(Debug, Clone, Deserialize)]
struct TranslationData {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PosterEntry {
    iso_639_1: Option<String>,
    file_path: String,
    #[serde(default)]
    vote_average: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct ChangedEntry {
    id: Option<u32>,
}

/// `w500` is the sweet spot between legibility and Telegram photo size;
/// fall back to the next size up, then to the original upload.
fn select_poster_size(sizes: &[String]) -> &'static str {
    for preferred in ["w500", "w780"] {
        if sizes.iter().any(|size| size == preferred) {
            return preferred;
        }
    }
    "original"
}

fn export_url(base: &str, date: NaiveDate) -> String {
    format!(
        "{}/movie_ids_{:02}_{:02}_{}.json.gz",
        base,
        date.month(),
        date.day(),
        date.year()
    )
}

async fn write_export(mut resp: reqwest::Response, dest: &Path) -> Result<u64, TmdbError> {
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written: u64 = 0;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Pull the needed fields out of a `/movie/{id}` response and assemble the
/// per-language title and poster maps.
fn parse_movie(body: &[u8], supported: &HashSet<String>) -> Result<Movie, TmdbError> {
    let mut tmdb_id = 0u32;
    let mut imdb_id: Option<String> = None;
    let mut original_title = String::new();
    let mut original_lang = String::new();
    let mut adult = false;
    let mut release_date: Option<String> = None;
    let mut vote_count = 0u32;
    let mut vote_average = 0f64;
    let mut collection: Option<Collection> = None;
    let mut translations: Vec<TranslationEntry> = Vec::new();
    let mut poster_entries: Vec<PosterEntry> = Vec::new();

    let mut scanner = Scanner::new();
    scanner.search_for(&mut tmdb_id, &["id"])?;
    scanner.search_for(&mut imdb_id, &["imdb_id"])?;
    scanner.search_for(&mut original_title, &["original_title"])?;
    scanner.search_for(&mut original_lang, &["original_language"])?;
    scanner.search_for(&mut adult, &["adult"])?;
    scanner.search_for(&mut release_date, &["release_date"])?;
    scanner.search_for(&mut vote_count, &["vote_count"])?;
    scanner.search_for(&mut vote_average, &["vote_average"])?;
    scanner.search_for(&mut collection, &["belongs_to_collection"])?;

    scanner.search_seq(&mut translations, &["translations", "translations"])?;
    let langs = supported.clone();
    scanner.set_filter::<TranslationEntry, _>(&["translations", "translations"], move |t| {
        langs.contains(&t.iso_639_1)
    })?;

    scanner.search_seq(&mut poster_entries, &["images", "posters"])?;
    let langs = supported.clone();
    scanner.set_filter::<PosterEntry, _>(&["images", "posters"], move |p| {
        p.iso_639_1.as_ref().is_some_and(|lang| langs.contains(lang))
    })?;

    scanner.scan(body)?;
    drop(scanner);

    let release_date = release_date
        .as_deref()
        .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok());
    let imdb_id = imdb_id.filter(|id| !id.is_empty());

    // The original title owns its language; translations fill the gaps.
    let mut titles = HashMap::new();
    titles.insert(original_lang.clone(), original_title.clone());
    for entry in translations {
        let Some(title) = entry.data.title else { continue };
        if title.is_empty() {
            continue;
        }
        titles.entry(entry.iso_639_1).or_insert(title);
    }

    // Keep the best-voted poster per language; the first one wins a tie.
    let mut posters: HashMap<String, PosterRef> = HashMap::new();
    for entry in poster_entries {
        let Some(lang) = entry.iso_639_1 else { continue };
        let better = posters
            .get(&lang)
            .map_or(true, |kept| entry.vote_average > kept.vote_average);
        if better {
            posters.insert(
                lang.clone(),
                PosterRef {
                    lang,
                    path: entry.file_path,
                    vote_average: entry.vote_average,
                },
            );
        }
    }

    Ok(Movie {
        tmdb_id,
        imdb_id,
        original_title,
        original_lang,
        adult,
        release_date,
        vote_count,
        vote_average,
        collection,
        titles,
        posters,
    })
}

fn parse_now_playing(body: &[u8]) -> Result<(Vec<MovieBrief>, u32), TmdbError> {
    let mut movies: Vec<MovieBrief> = Vec::new();
    let mut total_pages = 0u32;

    let mut scanner = Scanner::new();
    scanner.search_seq(&mut movies, &["results"])?;
    scanner.search_for(&mut total_pages, &["total_pages"])?;
    scanner.scan(body)?;
    drop(scanner);

    Ok((movies, total_pages))
}

fn parse_changed_movies(body: &[u8]) -> Result<(Vec<u32>, u32), TmdbError> {
    let mut entries: Vec<ChangedEntry> = Vec::new();
    let mut total_pages = 0u32;

    let mut scanner = Scanner::new();
    scanner.search_seq(&mut entries, &["results"])?;
    scanner.search_for(&mut total_pages, &["total_pages"])?;
    scanner.scan(body)?;
    drop(scanner);

    let ids = entries.into_iter().filter_map(|entry| entry.id).collect();
    Ok((ids, total_pages))
}

fn validate_poster(bytes: &[u8]) -> Result<(), TmdbError> {
    let format = image::guess_format(bytes).map_err(|e| TmdbError::ImageDecode(e.to_string()))?;
    if !matches!(format, image::ImageFormat::Jpeg | image::ImageFormat::Png) {
        return Err(TmdbError::ImageDecode(format!(
            "unsupported format {format:?}"
        )));
    }
    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| TmdbError::ImageDecode(e.to_string()))?;
    Ok(())
}
