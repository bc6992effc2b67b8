//! certprep - offline-first quiz progression and sync client.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quiz_config_and_utils::{init_logging, Config, Paths};
use tracing::{info, warn};

/// certprep command-line interface.
#[derive(Parser)]
#[command(name = "certprep")]
#[command(about = "Offline-first certification practice: local progress and server sync")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Overrides the config file
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, database and logs. Defaults to ~/.certprep
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show local progression stats
    Stats,
    /// Check the server health endpoint
    Health,
    /// Synchronize with the server
    Sync {
        #[command(subcommand)]
        mode: SyncMode,
    },
    /// Run periodic smart sync in the foreground until interrupted
    Schedule {
        /// Seconds between rounds. Defaults to the configured interval
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Import a JSON question bank
    ImportQuestions {
        file: PathBuf,
        /// Only import when the local question table is empty
        #[arg(long)]
        if_empty: bool,
    },
    /// List questions that were answered incorrectly
    WrongQuestions {
        /// Question language (en, de)
        #[arg(long, default_value = "en")]
        language: String,
    },
    /// Show exam gates; with a number, only that exam
    ExamStatus { exam: Option<i64> },
    /// Record a finished exam; a pass unlocks the next one
    RecordExam {
        exam: i64,
        correct: i64,
        #[arg(default_value_t = 80)]
        total: i64,
    },
    /// Show exam unlock progress, locally and from the server
    UnlockStatus,
}

#[derive(Subcommand, Clone, Copy)]
enum SyncMode {
    /// Push local stats and recent sessions
    Upload,
    /// Pull server stats when they show more progress
    Download,
    /// Merge both ways
    Smart,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let foreground = matches!(cli.command, Commands::Schedule { .. });
    init_logging(&level, &paths, foreground);

    match config.persist_device_id(&paths) {
        Ok(true) => info!(device_id = %config.device_id, "Generated new device id"),
        Ok(false) => {}
        Err(e) => warn!(error = %e, "Could not persist device id"),
    }

    let state = app::AppState::init(config, paths).await?;

    match cli.command {
        Commands::Stats => app::show_stats(&state).await?,
        Commands::Health => app::check_health(&state).await?,
        Commands::Sync { mode } => {
            let outcome = match mode {
                SyncMode::Upload => state.sync.upload().await,
                SyncMode::Download => state.sync.download().await,
                SyncMode::Smart => state.sync.smart_sync().await,
            };
            app::report_outcome(outcome)?;
        }
        Commands::Schedule { interval_secs } => app::run_schedule(&state, interval_secs).await?,
        Commands::ImportQuestions { file, if_empty } => app::import_questions(&state, &file, if_empty).await?,
        Commands::WrongQuestions { language } => app::wrong_questions(&state, &language).await?,
        Commands::ExamStatus { exam } => app::exam_status(&state, exam).await?,
        Commands::RecordExam { exam, correct, total } => app::record_exam(&state, exam, correct, total).await?,
        Commands::UnlockStatus => app::unlock_status(&state).await?,
    }

    Ok(())
}
