//! Scripted [`MovieApi`] implementation.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::tmdb::{Movie, MovieApi, MovieBrief, TmdbError};

/// A movie service stub scripted from test code. Movies, posters, the
/// daily export and the change feed are all plain in-memory tables;
/// call counters let tests assert what the harvester actually asked for.
#[derive(Default)]
pub struct MockMovieApi {
    movies: Mutex<HashMap<u32, Movie>>,
    posters: Mutex<HashMap<String, Vec<u8>>>,
    export_ids: Mutex<Vec<u32>>,
    changed_pages: Mutex<Vec<Vec<u32>>>,
    fail_export: AtomicBool,
    /// Ids whose next `get_movie` call fails with `RateLimit`.
    rate_limit_once: Mutex<Vec<u32>>,

    pub configure_calls: AtomicUsize,
    pub movie_fetches: Mutex<HashMap<u32, u32>>,
    pub poster_fetches: Mutex<HashMap<String, u32>>,
}

impl MockMovieApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_movie(self, movie: Movie) -> Self {
        self.movies.lock().unwrap().insert(movie.tmdb_id, movie);
        self
    }

    pub fn with_poster(self, path: &str, bytes: Vec<u8>) -> Self {
        self.posters.lock().unwrap().insert(path.to_string(), bytes);
        self
    }

    pub fn with_export(self, ids: &[u32]) -> Self {
        self.export_ids.lock().unwrap().extend_from_slice(ids);
        self
    }

    pub fn with_changed_page(self, ids: &[u32]) -> Self {
        self.changed_pages.lock().unwrap().push(ids.to_vec());
        self
    }

    pub fn with_failing_export(self) -> Self {
        self.fail_export.store(true, Ordering::SeqCst);
        self
    }

    pub fn rate_limit_next_fetch_of(self, tmdb_id: u32) -> Self {
        self.rate_limit_once.lock().unwrap().push(tmdb_id);
        self
    }

    pub fn movie_fetch_count(&self, tmdb_id: u32) -> u32 {
        self.movie_fetches
            .lock()
            .unwrap()
            .get(&tmdb_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn poster_fetch_count(&self, path: &str) -> u32 {
        self.poster_fetches
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

/// A movie skeleton tests can flesh out.
pub fn test_movie(tmdb_id: u32, title: &str, lang: &str, vote_count: u32) -> Movie {
    Movie {
        tmdb_id,
        imdb_id: None,
        original_title: title.to_string(),
        original_lang: lang.to_string(),
        adult: false,
        release_date: NaiveDate::from_ymd_opt(2000, 1, 1),
        vote_count,
        vote_average: 7.0,
        collection: None,
        titles: HashMap::from([(lang.to_string(), title.to_string())]),
        posters: HashMap::new(),
    }
}

#[async_trait]
impl MovieApi for MockMovieApi {
    async fn configure(&self) -> Result<(), TmdbError> {
        self.configure_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_daily_export(&self, _date: NaiveDate, dest: &Path) -> Result<(), TmdbError> {
        if self.fail_export.load(Ordering::SeqCst) {
            return Err(TmdbError::ExportLength);
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for id in self.export_ids.lock().unwrap().iter() {
            writeln!(encoder, r#"{{"id":{id},"original_title":"m{id}","popularity":1.0}}"#)?;
        }
        let bytes = encoder.finish()?;
        std::fs::write(dest, bytes)?;
        Ok(())
    }

    async fn get_movie(&self, tmdb_id: u32) -> Result<Movie, TmdbError> {
        *self
            .movie_fetches
            .lock()
            .unwrap()
            .entry(tmdb_id)
            .or_insert(0) += 1;

        {
            let mut limited = self.rate_limit_once.lock().unwrap();
            if let Some(pos) = limited.iter().position(|id| *id == tmdb_id) {
                limited.remove(pos);
                return Err(TmdbError::RateLimit);
            }
        }

        self.movies
            .lock()
            .unwrap()
            .get(&tmdb_id)
            .cloned()
            .ok_or(TmdbError::Api { status: 404 })
    }

    async fn get_now_playing(&self, page: u32) -> Result<Vec<MovieBrief>, TmdbError> {
        if page > 1 {
            return Err(TmdbError::Page);
        }
        Ok(self
            .movies
            .lock()
            .unwrap()
            .values()
            .map(|movie| MovieBrief {
                id: movie.tmdb_id,
                original_title: Some(movie.original_title.clone()),
            })
            .collect())
    }

    async fn get_changed_movies(&self, page: u32) -> Result<Vec<u32>, TmdbError> {
        let pages = self.changed_pages.lock().unwrap();
        match pages.get(page as usize - 1) {
            Some(ids) => Ok(ids.clone()),
            None => Err(TmdbError::Page),
        }
    }

    async fn get_poster(&self, path: &str) -> Result<Vec<u8>, TmdbError> {
        *self
            .poster_fetches
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_insert(0) += 1;

        self.posters
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or(TmdbError::Api { status: 404 })
    }
}
