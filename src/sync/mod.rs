pub mod scheduler;
pub mod source;
pub mod updater;

pub use scheduler::{refresh_entity, run_timeline_refresh};
pub use source::HistorySource;
pub use updater::{HistoryUpdater, UpdateOutcome};
