//! SQLite-backed catalog implementation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

use super::{CatalogError, CatalogStats, MovieUpsert, PosterInsert, TitleRow};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const MOVIE_UPSERT: &str = "
INSERT INTO movie (tmdb_id,
                   original_title,
                   original_lang,
                   released_on,
                   adult,
                   imdb_id,
                   vote_count,
                   vote_average,
                   collection_id)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT (tmdb_id) DO UPDATE SET
    original_title = excluded.original_title,
    original_lang  = excluded.original_lang,
    released_on    = excluded.released_on,
    adult          = excluded.adult,
    imdb_id        = excluded.imdb_id,
    vote_count     = excluded.vote_count,
    vote_average   = excluded.vote_average,
    collection_id  = excluded.collection_id,
    updated_on     = datetime('now');
";

const MOVIE_DB_ID: &str = "SELECT id FROM movie WHERE tmdb_id = ?1;";

const POSTER_LANGS: &str = "
    SELECT md.lang
      FROM movie AS m
INNER JOIN movie_detail AS md ON m.id = md.fk_movie_id
     WHERE m.tmdb_id = ?1;
";

const POSTER_INSERT: &str = "
INSERT INTO movie_detail (fk_movie_id, lang, title, poster)
     VALUES (?1, ?2, ?3, ?4);
";

const TITLES_AFTER: &str = "
   SELECT movie_detail.id, movie_detail.title, movie.released_on, movie.collection_id
     FROM movie_detail
LEFT JOIN movie ON movie_detail.fk_movie_id = movie.id
    WHERE movie_detail.id > ?1
 ORDER BY movie_detail.id;
";

const POSTER_BY_DETAIL_ID: &str = "SELECT poster FROM movie_detail WHERE id = ?1;";

/// One task's handle on the catalog database. The connection sits behind
/// a mutex so a handle can be referenced across await points; statements
/// themselves never hold the lock over one.
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl Catalog {
    /// Open (creating tables if needed) the catalog at `path` and set the
    /// connection's busy timeout.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(map_err)?;
        Self::setup(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// In-memory catalog for tests. Separate handles do not see each
    /// other's data; use a temp file when a test needs several handles.
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory().map_err(map_err)?;
        Self::setup(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn setup(conn: &Connection) -> Result<(), CatalogError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(map_err)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS movie (
                id             INTEGER PRIMARY KEY,
                tmdb_id        INTEGER NOT NULL UNIQUE,
                original_title TEXT    NOT NULL,
                original_lang  TEXT    NOT NULL,
                released_on    TEXT    NOT NULL,
                adult          INTEGER NOT NULL,
                imdb_id        TEXT,
                vote_count     INTEGER,
                vote_average   REAL,
                -- 0 means the movie belongs to no collection.
                collection_id  INTEGER,
                created_on     TEXT DEFAULT (datetime('now')),
                updated_on     TEXT
            );

            CREATE TABLE IF NOT EXISTS movie_detail (
                id          INTEGER PRIMARY KEY,
                fk_movie_id INTEGER NOT NULL REFERENCES movie(id),
                lang        TEXT NOT NULL,
                title       TEXT NOT NULL,
                poster      BLOB,
                created_on  TEXT DEFAULT (datetime('now')),
                updated_on  TEXT,
                            UNIQUE (fk_movie_id, lang)
            );
            ",
        )
        .map_err(map_err)
    }

    /// Insert or update one movie description outside a crawl transaction.
    pub fn upsert_movie(&self, movie: &MovieUpsert) -> Result<(), CatalogError> {
        let released_on = date_text(movie.released_on);
        self.conn
            .lock()
            .unwrap()
            .execute(
                MOVIE_UPSERT,
                params![
                    movie.tmdb_id,
                    movie.original_title,
                    movie.original_lang,
                    released_on,
                    movie.adult,
                    movie.imdb_id,
                    movie.vote_count,
                    movie.vote_average,
                    movie.collection_id,
                ],
            )
            .map(|_| ())
            .map_err(map_err)
    }

    /// Internal id of a movie, if it is already in the catalog.
    pub fn movie_db_id(&self, tmdb_id: u32) -> Result<Option<i64>, CatalogError> {
        self.conn
            .lock()
            .unwrap()
            .prepare_cached(MOVIE_DB_ID)
            .map_err(map_err)?
            .query_row(params![tmdb_id], |row| row.get(0))
            .optional()
            .map_err(map_err)
    }

    /// Languages for which a poster row is already stored.
    pub fn poster_langs(&self, tmdb_id: u32) -> Result<HashSet<String>, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(POSTER_LANGS).map_err(map_err)?;
        let rows = stmt
            .query_map(params![tmdb_id], |row| row.get::<_, String>(0))
            .map_err(map_err)?;

        let mut langs = HashSet::new();
        for lang in rows {
            langs.insert(lang.map_err(map_err)?);
        }
        Ok(langs)
    }

    /// The crawl unit: upsert the description and attach the freshly
    /// fetched posters, all inside one transaction. Any failure rolls the
    /// whole movie back.
    pub fn store_crawled(
        &self,
        movie: &MovieUpsert,
        posters: &[PosterInsert],
    ) -> Result<(), CatalogError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(map_err)?;

        let released_on = date_text(movie.released_on);
        tx.execute(
            MOVIE_UPSERT,
            params![
                movie.tmdb_id,
                movie.original_title,
                movie.original_lang,
                released_on,
                movie.adult,
                movie.imdb_id,
                movie.vote_count,
                movie.vote_average,
                movie.collection_id,
            ],
        )
        .map_err(map_err)?;

        let movie_db_id: i64 = tx
            .query_row(MOVIE_DB_ID, params![movie.tmdb_id], |row| row.get(0))
            .map_err(map_err)?;

        for poster in posters {
            tx.execute(
                POSTER_INSERT,
                params![movie_db_id, poster.lang, poster.title, poster.image],
            )
            .map_err(map_err)?;
        }

        tx.commit().map_err(map_err)
    }

    /// Title rows with `movie_detail.id` greater than `max_id`, ordered by
    /// id, for the matcher's incremental loader.
    pub fn titles_after(&self, max_id: i64) -> Result<Vec<TitleRow>, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(TITLES_AFTER).map_err(map_err)?;
        let rows = stmt
            .query_map(params![max_id], |row| {
                let released_on: Option<String> = row.get(2)?;
                let collection_id: Option<i64> = row.get(3)?;
                Ok(TitleRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    released_on: released_on.as_deref().and_then(parse_date),
                    collection_id: collection_id.unwrap_or(0),
                })
            })
            .map_err(map_err)?;

        let mut titles = Vec::new();
        for row in rows {
            titles.push(row.map_err(map_err)?);
        }
        Ok(titles)
    }

    /// Row counts of both tables.
    pub fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let conn = self.conn.lock().unwrap();
        let movies: u64 = conn
            .query_row("SELECT COUNT(*) FROM movie", [], |row| row.get(0))
            .map_err(map_err)?;
        let posters: u64 = conn
            .query_row("SELECT COUNT(*) FROM movie_detail", [], |row| row.get(0))
            .map_err(map_err)?;
        Ok(CatalogStats { movies, posters })
    }

    /// Poster bytes by `movie_detail.id`.
    pub fn poster(&self, detail_id: i64) -> Result<Vec<u8>, CatalogError> {
        let poster: Option<Vec<u8>> = self
            .conn
            .lock()
            .unwrap()
            .prepare_cached(POSTER_BY_DETAIL_ID)
            .map_err(map_err)?
            .query_row(params![detail_id], |row| row.get(0))
            .optional()
            .map_err(map_err)?
            .flatten();

        poster.ok_or_else(|| CatalogError::NotFound(format!("poster for detail id {detail_id}")))
    }
}

fn date_text(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn map_err(e: rusqlite::Error) -> CatalogError {
    if let rusqlite::Error::SqliteFailure(inner, _) = &e {
        match inner.code {
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                return CatalogError::Busy
            }
            _ => {}
        }
    }
    CatalogError::Database(e.to_string())
}
