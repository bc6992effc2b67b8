//! Streaks, daily goals, totals, achievements and exam gating.
//!
//! [`ProgressionEngine`] owns no state of its own: every operation is a
//! read-modify-write of the singleton stats row in the local store.

mod achievements;
mod clock;
mod engine;
mod error;
mod exams;
mod streak;
mod workflow;

pub use achievements::{earned_achievements, Achievement};
pub use clock::{format_date, parse_date, Clock, FixedClock, SystemClock, DATE_FORMAT};
pub use engine::{ExamStatus, ProgressionEngine};
pub use error::{ProgressionError, ProgressionResult};
pub use exams::{exam_catalog, exam_one_progress, exam_passed, exam_unlocked, Difficulty, Exam, UnlockProgress};
pub use streak::{apply_daily_progress, apply_overall, apply_streak, daily_goal_reached, StatsDelta};
pub use workflow::{ExamOutcome, QuizCompletion, QuizSummary};
