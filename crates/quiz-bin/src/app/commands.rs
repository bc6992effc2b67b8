//! Command handlers. Output goes to stdout as JSON or plain lines.

use std::path::Path;
use std::time::Duration;

use quiz_database::{parse_question_bank, Language};
use quiz_remote_gateway::{SyncApi, UnlockExamRequest};
use quiz_sync_engine::{SyncOutcome, SyncScheduler};
use serde_json::json;
use tracing::{info, warn};

use super::AppState;

type CommandResult = Result<(), Box<dyn std::error::Error>>;

// =============================================================================
// Local progression
// =============================================================================

pub async fn show_stats(state: &AppState) -> CommandResult {
    let stats = state.progression.stats().await?;
    let goal_reached = state.progression.daily_goal_reached().await?;
    let output = json!({
        "stats": stats,
        "achievements": stats.achievements(),
        "daily_goal_reached": goal_reached,
        "device_id": state.config.device_id,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub async fn exam_status(state: &AppState, exam: Option<i64>) -> CommandResult {
    let statuses = state.progression.exam_statuses().await?;
    match exam {
        Some(number) => {
            let status = statuses
                .into_iter()
                .find(|s| s.exam.number == number)
                .ok_or_else(|| format!("unknown exam {}", number))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        None => println!("{}", serde_json::to_string_pretty(&statuses)?),
    }
    Ok(())
}

/// Record an exam locally, then report a pass to the server.
///
/// The server call is best effort; the local unlock already happened.
pub async fn record_exam(state: &AppState, exam: i64, correct: i64, total: i64) -> CommandResult {
    let outcome = state.progression.record_exam_result(exam, correct, total).await?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.passed {
        let request = UnlockExamRequest {
            device_id: state.config.device_id.clone(),
            exam_number: exam,
            score: correct,
            passed: true,
        };
        match state.gateway.unlock_exam(&request).await {
            Ok(message) => info!(exam, %message, "Server acknowledged exam pass"),
            Err(e) => warn!(exam, error = %e, "Could not report exam pass to server"),
        }
    }
    Ok(())
}

pub async fn import_questions(state: &AppState, file: &Path, only_if_empty: bool) -> CommandResult {
    let content = std::fs::read_to_string(file)?;
    let imported = if only_if_empty {
        state.store.initialize_questions_if_needed(&content).await?
    } else {
        state.store.import_questions(parse_question_bank(&content)?).await?
    };
    let total = state.store.question_count().await?;
    println!("Imported {} questions ({} in bank)", imported, total);
    Ok(())
}

pub async fn wrong_questions(state: &AppState, language: &str) -> CommandResult {
    let language = Language::parse_or_default(language);
    let questions = state.store.wrongly_answered_questions().await?;
    if questions.is_empty() {
        println!("No wrongly answered questions");
        return Ok(());
    }
    for question in &questions {
        println!("#{} {}", question.id, question.text(language));
        for option in question.options(language) {
            println!("    {}", option);
        }
        println!("    correct: {}", question.correct);
    }
    Ok(())
}

// =============================================================================
// Server
// =============================================================================

pub async fn check_health(state: &AppState) -> CommandResult {
    let health = state.gateway.health().await?;
    println!("{} ({})", health.status, state.gateway.current_base_url());
    if !health.is_ok() {
        return Err(format!("server reported status {}", health.status).into());
    }
    Ok(())
}

pub async fn unlock_status(state: &AppState) -> CommandResult {
    let local = state.progression.exam_one_progress().await?;
    let remote = match state.gateway.unlock_status(&state.config.device_id).await {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(error = %e, "Remote unlock status unavailable");
            None
        }
    };
    let output = json!({ "local": local, "remote": remote });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print a sync outcome; failures make the process exit non-zero.
pub fn report_outcome(outcome: SyncOutcome) -> CommandResult {
    match outcome {
        SyncOutcome::Success(message) => {
            println!("{}", message);
            Ok(())
        }
        SyncOutcome::Failure(failure) => Err(Box::new(failure)),
    }
}

pub async fn run_schedule(state: &AppState, interval_secs: Option<u64>) -> CommandResult {
    let period = Duration::from_secs(interval_secs.unwrap_or(state.config.sync_interval_secs).max(1));
    info!(period_secs = period.as_secs(), "Starting sync scheduler");

    let scheduler = SyncScheduler::start(state.sync.clone(), period);
    let mut outcomes = scheduler.subscribe();

    loop {
        tokio::select! {
            changed = outcomes.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(outcome) = outcomes.borrow_and_update().clone() {
                    println!("{}", outcome);
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for ctrl-c");
                }
                info!("Interrupted, stopping scheduler");
                break;
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}
