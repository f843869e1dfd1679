//! Prometheus metrics for the harvester and the query path.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

/// Movie metadata fetches by result ("ok", "error", "rate_limited").
pub static MOVIES_FETCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("posterbot_movies_fetched_total", "Movie metadata fetches"),
        &["result"],
    )
    .unwrap()
});

/// Poster downloads by result ("ok", "error", "rate_limited").
pub static POSTERS_FETCHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("posterbot_posters_fetched_total", "Poster downloads"),
        &["result"],
    )
    .unwrap()
});

/// Movies committed to the catalog.
pub static MOVIES_STORED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "posterbot_movies_stored_total",
        "Movies committed to the catalog",
    )
    .unwrap()
});

/// Ids the seeker put on the crawl channel.
pub static MOVIES_EMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "posterbot_movies_emitted_total",
        "Candidate ids emitted by the seeker",
    )
    .unwrap()
});

/// Title queries answered, by outcome ("match", "no_match").
pub static QUERIES_SERVED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("posterbot_queries_served_total", "Title queries answered"),
        &["result"],
    )
    .unwrap()
});

/// End-to-end time to answer a title query.
pub static QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "posterbot_query_duration_seconds",
            "Time to rank a query and fetch the poster",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &[],
    )
    .unwrap()
});

/// All core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(MOVIES_FETCHED.clone()),
        Box::new(POSTERS_FETCHED.clone()),
        Box::new(MOVIES_STORED.clone()),
        Box::new(MOVIES_EMITTED.clone()),
        Box::new(QUERIES_SERVED.clone()),
        Box::new(QUERY_DURATION.clone()),
    ]
}
