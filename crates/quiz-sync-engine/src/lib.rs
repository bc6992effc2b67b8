//! Offline-first synchronization of progression stats.
//!
//! ```text
//! LocalStore ──▶ SyncEngine ──▶ SyncApi (RemoteGateway)
//!                    ▲
//!              SyncScheduler
//! ```
//!
//! Every operation returns a [`SyncOutcome`]; failures are values, not
//! errors. Merging is a coordinate-wise maximum plus achievement union, so
//! repeated or reordered syncs converge on the same state.

mod engine;
mod merge;
mod outcome;
mod scheduler;
#[cfg(test)]
mod testing;

pub use engine::{SyncEngine, UPLOAD_SESSION_LIMIT};
pub use merge::{apply_to_local, merge_stats, session_to_dto, should_update_local, stats_to_dto, union_achievements};
pub use outcome::{SyncFailure, SyncOutcome};
pub use scheduler::SyncScheduler;
