use std::sync::Arc;

use crate::chart::ChartRenderer;
use crate::config::Config;
use crate::fetch::SensorFetcher;

/// Shared, read-only request context. Every request gets its own series and
/// chart; nothing here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<SensorFetcher>,
    pub renderer: Arc<ChartRenderer>,
}

impl AppState {
    pub fn new(config: Config, fetcher: SensorFetcher, renderer: ChartRenderer) -> Self {
        Self {
            config: Arc::new(config),
            fetcher: Arc::new(fetcher),
            renderer: Arc::new(renderer),
        }
    }
}
