pub mod clock;
pub mod state;

pub use clock::{Clock, SystemClock};
pub use state::AppState;
