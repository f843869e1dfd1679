//! In-memory title index and ranked retrieval.
//!
//! The index is loaded incrementally from the catalog and only ever grows.
//! A query is matched against every known title with a weighted edit
//! distance; the costs make an incomplete query cheap and a differently
//! spelled one prohibitively expensive.

mod index;

pub use index::{run_refresher, TitleIndex, REFRESH_INTERVAL};

use chrono::{Datelike, NaiveDate};

/// Inserting a character the user left out.
pub const INS_COST: usize = 1;
/// Deleting noise the user typed.
pub const DEL_COST: usize = 7;
/// Swapping a character: a differently spelled word is a different title.
pub const SUB_COST: usize = 100;

/// Ranked candidates returned per query.
pub const MAX_CANDIDATES: usize = 10;

/// One movie known to the index, keyed by its `movie_detail` id.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleEntry {
    pub id: i64,
    pub title: String,
    /// Lowercased once at load time; queries are matched against this.
    pub title_lower: String,
    pub released_on: Option<NaiveDate>,
    /// 0 for movies outside any collection.
    pub collection_id: i64,
}

impl TitleEntry {
    pub fn new(
        id: i64,
        title: impl Into<String>,
        released_on: Option<NaiveDate>,
        collection_id: i64,
    ) -> Self {
        let title = title.into();
        let title_lower = title.to_lowercase();
        Self { id, title, title_lower, released_on, collection_id }
    }

    /// Caption shown under the poster: the title plus the release year,
    /// when one is known.
    pub fn caption(&self) -> String {
        match self.released_on {
            Some(date) => format!("{} ({})", self.title, date.year()),
            None => self.title.clone(),
        }
    }
}
