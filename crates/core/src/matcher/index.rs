use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{error, info};

use super::{TitleEntry, DEL_COST, INS_COST, MAX_CANDIDATES, SUB_COST};
use crate::catalog::{retry_busy, Catalog, CatalogError};
use crate::levenshtein;

/// How often the refresher pulls new titles out of the catalog.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Default)]
struct Inner {
    entries: HashMap<i64, TitleEntry>,
    /// Highest `movie_detail.id` seen; the next load asks only for rows
    /// above it.
    max_id: i64,
}

/// Shared title index: many concurrent readers, one loading writer.
#[derive(Default)]
pub struct TitleIndex {
    inner: RwLock<Inner>,
}

/// A candidate with its edit cost; orders by cost so a [`BinaryHeap`]
/// keeps the worst candidate on top.
struct Scored {
    cost: usize,
    entry: TitleEntry,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost.cmp(&other.cost)
    }
}

impl TitleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull rows above the high-water mark from the catalog into the
    /// index. The only writer. Returns how many entries were added.
    pub fn load_new(&self, catalog: &Catalog) -> Result<usize, CatalogError> {
        let max_id = self.inner.read().unwrap().max_id;
        let rows = catalog.titles_after(max_id)?;

        let mut inner = self.inner.write().unwrap();
        let loaded = rows.len();
        for row in rows {
            inner.max_id = inner.max_id.max(row.id);
            inner.entries.insert(
                row.id,
                TitleEntry::new(row.id, row.title, row.released_on, row.collection_id),
            );
        }
        Ok(loaded)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry by `movie_detail` id, as carried in callback buttons.
    pub fn get(&self, id: i64) -> Option<TitleEntry> {
        self.inner.read().unwrap().entries.get(&id).cloned()
    }

    /// Rank the catalog against `query` and return up to
    /// [`MAX_CANDIDATES`] entries, best first.
    ///
    /// Entries sharing the best-matching title are ordered newest release
    /// first, so a remake beats its original for the top spot. The head
    /// entry's collection follows it directly (release order), then the
    /// runner-up with its collection, then the rest by distance.
    pub fn best_matches(&self, query: &str) -> Vec<TitleEntry> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut heap: BinaryHeap<Scored> = BinaryHeap::with_capacity(MAX_CANDIDATES + 1);
        {
            let inner = self.inner.read().unwrap();
            for entry in inner.entries.values() {
                let cost = levenshtein::distance(
                    &query,
                    &entry.title_lower,
                    INS_COST,
                    DEL_COST,
                    SUB_COST,
                );
                heap.push(Scored { cost, entry: entry.clone() });
                if heap.len() > MAX_CANDIDATES {
                    heap.pop();
                }
            }
        }

        let mut ranked = heap.into_sorted_vec();

        // Identical titles at the head: put the latest release on top
        // ("The Lion King" 2019 over 1994).
        let mut same_title = 1;
        while same_title < ranked.len()
            && ranked[same_title].entry.title_lower == ranked[0].entry.title_lower
        {
            same_title += 1;
        }
        ranked[..same_title].sort_by(|a, b| b.entry.released_on.cmp(&a.entry.released_on));

        if ranked.len() <= 3 {
            return ranked.into_iter().map(|scored| scored.entry).collect();
        }

        // The head entry followed by the rest of its collection in
        // release order.
        let head_collection = ranked[0].entry.collection_id;
        let mut result = vec![ranked[0].entry.clone()];
        if head_collection != 0 {
            for scored in &ranked[1..] {
                if scored.entry.collection_id == head_collection {
                    result.push(scored.entry.clone());
                }
            }
            result[1..].sort_by(|a, b| a.released_on.cmp(&b.released_on));
        }

        // Then the runner-up and its collection, unless it already rode in
        // with the head's.
        let second = ranked[1].entry.clone();
        let second_collection = second.collection_id;
        if second_collection != head_collection || second_collection == 0 {
            let group_start = result.len();
            result.push(second);
            if second_collection != 0 {
                for scored in &ranked[2..] {
                    if scored.entry.collection_id == second_collection {
                        result.push(scored.entry.clone());
                    }
                }
            }
            result[group_start..].sort_by(|a, b| a.released_on.cmp(&b.released_on));
        }

        // Everything else keeps its distance order.
        for scored in &ranked[2..] {
            let collection = scored.entry.collection_id;
            if collection == 0
                || (collection != head_collection && collection != second_collection)
            {
                result.push(scored.entry.clone());
            }
        }

        result
    }
}

/// Periodically refresh `index` from the catalog at `db_path` until the
/// shutdown signal fires.
pub async fn run_refresher(
    index: Arc<TitleIndex>,
    db_path: PathBuf,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("title refresher started");
    let catalog = match Catalog::open(&db_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("title refresher cannot open the catalog: {e}");
            return;
        }
    };

    loop {
        match retry_busy(|| index.load_new(&catalog)).await {
            Ok(loaded) => info!(loaded, total = index.len(), "title index refreshed"),
            Err(e) => error!("title index refresh failed: {e}"),
        }

        tokio::select! {
            _ = shutdown.recv() => break,
            _ = tokio::time::sleep(REFRESH_INTERVAL) => {}
        }
    }
    info!("title refresher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn index_of(entries: Vec<TitleEntry>) -> TitleIndex {
        let index = TitleIndex::new();
        {
            let mut inner = index.inner.write().unwrap();
            for entry in entries {
                inner.max_id = inner.max_id.max(entry.id);
                inner.entries.insert(entry.id, entry);
            }
        }
        index
    }

    fn ids(matches: &[TitleEntry]) -> Vec<i64> {
        matches.iter().map(|entry| entry.id).collect()
    }

    #[test]
    fn empty_and_whitespace_queries_match_nothing() {
        let index = index_of(vec![TitleEntry::new(1, "Frozen", date(2013, 11, 27), 0)]);
        assert!(index.best_matches("").is_empty());
        assert!(index.best_matches("   \t  ").is_empty());
    }

    #[test]
    fn head_minimizes_edit_distance() {
        let index = index_of(vec![
            TitleEntry::new(1, "Frozen", date(2013, 11, 27), 0),
            TitleEntry::new(2, "The Matrix", date(1999, 3, 30), 0),
            TitleEntry::new(3, "Heat", date(1995, 12, 15), 0),
        ]);
        let matches = index.best_matches("frozen");
        assert_eq!(matches[0].id, 1);
    }

    #[test]
    fn query_is_normalized_before_matching() {
        let index = index_of(vec![
            TitleEntry::new(1, "Frozen", date(2013, 11, 27), 0),
            TitleEntry::new(2, "Heat", date(1995, 12, 15), 0),
        ]);
        let matches = index.best_matches("  FroZen \n");
        assert_eq!(matches[0].id, 1);
    }

    #[test]
    fn small_catalog_comes_back_whole_in_distance_order() {
        let index = index_of(vec![
            TitleEntry::new(1, "Alien", date(1979, 5, 25), 55),
            TitleEntry::new(2, "Aliens", date(1986, 7, 18), 55),
        ]);
        let matches = index.best_matches("alien");
        // Two entries, no collection grouping, closest first.
        assert_eq!(ids(&matches), vec![1, 2]);
    }

    #[test]
    fn identical_titles_put_the_newer_release_first() {
        let index = index_of(vec![
            TitleEntry::new(11, "The Lion King", date(1994, 6, 15), 24),
            TitleEntry::new(12, "The Lion King", date(2019, 7, 19), 24),
        ]);
        let matches = index.best_matches("lion king");
        assert_eq!(ids(&matches), vec![12, 11]);
    }

    #[test]
    fn head_collection_follows_in_release_order() {
        let index = index_of(vec![
            TitleEntry::new(7, "Saga", date(2008, 1, 1), 99),
            TitleEntry::new(8, "Saga II", date(2011, 1, 1), 99),
            TitleEntry::new(9, "Saga III", date(2014, 1, 1), 99),
            TitleEntry::new(5, "Sago", date(2000, 1, 1), 0),
            TitleEntry::new(6, "Sagb", date(2001, 1, 1), 0),
        ]);
        let matches = index.best_matches("saga");
        assert_eq!(matches.len(), 5);
        assert_eq!(&ids(&matches)[..3], &[7, 8, 9]);
        // The rest are the standalone entries, in distance order.
        let rest: Vec<i64> = ids(&matches)[3..].to_vec();
        assert!(rest.contains(&5));
        assert!(rest.contains(&6));
    }

    #[test]
    fn runner_up_collection_comes_after_the_heads() {
        let index = index_of(vec![
            TitleEntry::new(1, "Shrek", date(2001, 5, 18), 10),
            TitleEntry::new(2, "Shrek 2", date(2004, 5, 19), 10),
            TitleEntry::new(3, "Shred", date(2010, 1, 1), 20),
            TitleEntry::new(4, "Shred 2", date(2012, 1, 1), 20),
            TitleEntry::new(5, "Heat", date(1995, 12, 15), 0),
        ]);
        let matches = index.best_matches("shrek");
        // Head "Shrek" with its sequel, then the "Shred" collection, then
        // the unrelated tail.
        assert_eq!(ids(&matches), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn standalone_head_is_followed_by_the_runner_up_collection() {
        let index = index_of(vec![
            TitleEntry::new(1, "Solo", date(2018, 5, 25), 0),
            TitleEntry::new(2, "Sole", date(2010, 1, 1), 30),
            TitleEntry::new(3, "Sole 2", date(2013, 1, 1), 30),
            TitleEntry::new(4, "Sole 3", date(2011, 1, 1), 30),
            TitleEntry::new(5, "Heat", date(1995, 12, 15), 0),
        ]);
        let matches = index.best_matches("solo");
        // Standalone head, then the runner-up's collection in release
        // order (2010, 2011, 2013), then the tail.
        assert_eq!(ids(&matches), vec![1, 2, 4, 3, 5]);
    }

    #[test]
    fn at_most_ten_candidates_come_back() {
        let entries: Vec<TitleEntry> = (1..=15)
            .map(|i| TitleEntry::new(i, format!("Movie {i:02}"), date(2000, 1, 1), 0))
            .collect();
        let index = index_of(entries);
        let matches = index.best_matches("movie");
        assert_eq!(matches.len(), MAX_CANDIDATES);
    }

    #[test]
    fn unknown_release_dates_sort_last_within_identical_titles() {
        let index = index_of(vec![
            TitleEntry::new(1, "Ghost", None, 0),
            TitleEntry::new(2, "Ghost", date(1990, 7, 13), 0),
        ]);
        let matches = index.best_matches("ghost");
        assert_eq!(ids(&matches), vec![2, 1]);
    }

    #[test]
    fn get_returns_entries_by_detail_id() {
        let index = index_of(vec![TitleEntry::new(42, "Heat", date(1995, 12, 15), 0)]);
        assert_eq!(index.get(42).unwrap().title, "Heat");
        assert!(index.get(1).is_none());
    }

    #[test]
    fn load_new_is_incremental_and_monotonic() {
        let catalog = Catalog::open_in_memory().unwrap();
        let index = TitleIndex::new();

        store(&catalog, 100, "First", date(2001, 1, 1));
        store(&catalog, 200, "Second", date(2002, 2, 2));
        assert_eq!(index.load_new(&catalog).unwrap(), 2);
        assert_eq!(index.len(), 2);

        // Nothing new: a second load is a no-op.
        assert_eq!(index.load_new(&catalog).unwrap(), 0);

        store(&catalog, 300, "Third", date(2003, 3, 3));
        assert_eq!(index.load_new(&catalog).unwrap(), 1);
        assert_eq!(index.len(), 3);
    }

    fn store(catalog: &Catalog, tmdb_id: u32, title: &str, released: Option<NaiveDate>) {
        use crate::catalog::{MovieUpsert, PosterInsert};
        catalog
            .store_crawled(
                &MovieUpsert {
                    tmdb_id,
                    original_title: title.to_string(),
                    original_lang: "en".to_string(),
                    released_on: released,
                    adult: false,
                    imdb_id: None,
                    vote_count: 50,
                    vote_average: 7.0,
                    collection_id: 0,
                },
                &[PosterInsert {
                    lang: "en".to_string(),
                    title: title.to_string(),
                    image: vec![1, 2, 3],
                }],
            )
            .unwrap();
    }
}
