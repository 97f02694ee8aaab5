//! Pure schedule logic. Every function here takes its inputs (including
//! "now") explicitly and performs no I/O.

pub mod catalog;
pub mod collectors;
pub mod history;
pub mod market_clock;
pub mod matcher;
pub mod session;
pub mod timeline;
pub mod timezone;

pub use catalog::PresetCatalog;
pub use matcher::reconcile;
pub use session::ClassificationStrategy;
pub use timeline::build_timeline;
