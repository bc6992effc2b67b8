//! Service wiring and command handlers.

mod commands;
mod state;

pub use commands::{
    check_health, exam_status, import_questions, record_exam, report_outcome, run_schedule, show_stats,
    unlock_status, wrong_questions,
};
pub use state::AppState;
