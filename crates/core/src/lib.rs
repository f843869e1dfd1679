pub mod catalog;
pub mod config;
pub mod harvester;
pub mod journal;
pub mod jsonscan;
pub mod levenshtein;
pub mod matcher;
pub mod metrics;
pub mod telegram;
pub mod testing;
pub mod tmdb;

pub use catalog::{Catalog, CatalogError};
pub use config::{load_config, validate_config, Config, ConfigError};
pub use harvester::Harvester;
pub use journal::{stdout_journal, JournalGuard, JournalWriter, RedactTable};
pub use matcher::TitleIndex;
pub use tmdb::{MovieApi, TmdbClient, TmdbError};
