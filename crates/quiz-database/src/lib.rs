//! SQLite storage for the quiz client.
//!
//! This crate provides:
//! - Async SQLite executor with a dedicated thread
//! - Versioned migrations
//! - Model types for questions, sessions, answers and the stats row
//! - Query helpers and the [`LocalStore`] facade
//! - Live stats subscriptions
//!
//! ```ignore
//! let store = LocalStore::open(&paths.database_file()).await?;
//! let id = store.save_session_with_answers(session, answers).await?;
//! let stats = store.user_stats().await?;
//! ```
//!
//! **Important**: only SQL and row mapping run inside `db.call()`.
//! Network calls and anything slow happen outside.

mod error;
mod executor;
mod live;
mod migrations;
mod models;
pub mod queries;
mod question_bank;
mod store;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::AsyncDatabase;
pub use live::{StatsHub, StatsSubscription};
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use models::*;
pub use question_bank::parse_question_bank;
pub use store::LocalStore;
