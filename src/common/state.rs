use std::sync::Arc;

use crate::common::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::services::{CacheStore, KeyValueStore};
use crate::sync::{HistorySource, HistoryUpdater};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub updater: Arc<HistoryUpdater>,
}

impl AppState {
    pub fn new(
        config: Config,
        source: Arc<dyn HistorySource>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::with_clock(config, source, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Config,
        source: Arc<dyn HistorySource>,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let updater = HistoryUpdater::new(source, CacheStore::new(store), clock);

        Self {
            config: Arc::new(config),
            updater: Arc::new(updater),
        }
    }
}
