use std::sync::Arc;

use posterbot_core::catalog::{Catalog, CatalogError, CatalogStats};
use posterbot_core::matcher::TitleIndex;
use posterbot_core::telegram;

/// Shared application state for the webhook handlers.
pub struct AppState {
    titles: Arc<TitleIndex>,
    telegram: telegram::Client,
    /// The bot's own catalog handle, used only to read poster blobs.
    catalog: Catalog,
    registry: prometheus::Registry,
}

impl AppState {
    pub fn new(
        titles: Arc<TitleIndex>,
        telegram: telegram::Client,
        catalog: Catalog,
        registry: prometheus::Registry,
    ) -> Self {
        Self {
            titles,
            telegram,
            catalog,
            registry,
        }
    }

    pub fn titles(&self) -> &TitleIndex {
        &self.titles
    }

    pub fn telegram(&self) -> &telegram::Client {
        &self.telegram
    }

    pub fn registry(&self) -> &prometheus::Registry {
        &self.registry
    }

    /// Poster bytes by `movie_detail` id.
    pub fn poster(&self, detail_id: i64) -> Result<Vec<u8>, CatalogError> {
        self.catalog.poster(detail_id)
    }

    pub fn catalog_stats(&self) -> Result<CatalogStats, CatalogError> {
        self.catalog.stats()
    }
}
