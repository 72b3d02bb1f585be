use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use spaced_review::database::db;
use spaced_review::export::json::{ReviewExport, export_json_to_path, import_json};
use spaced_review::models::rating::parse_quality;
use spaced_review::models::sm2::format_interval;
use spaced_review::{Scheduler, SchedulerConfig, StudyStats};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "spaced-review", about = "Spaced repetition scheduling for flashcards", version)]
struct Cli {
    /// SQLite database holding review states
    #[arg(long, global = true, default_value = "db.sqlite3")]
    db: PathBuf,

    /// JSON file overriding scheduler policy
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Review instant in RFC 3339 (defaults to the current time)
    #[arg(long, global = true)]
    now: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a review of a flashcard
    Review {
        user: String,
        flashcard_id: i64,
        /// 0-5, or hard / medium / easy
        quality: String,
    },

    /// List cards that are due
    Due {
        user: String,
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Show the interval each answer button would give
    Preview { user: String, flashcard_id: i64 },

    /// Show study statistics
    Stats { user: String },

    /// Export a user's review states to JSON
    Export { user: String, path: PathBuf },

    /// Restore review states from a JSON export
    Import { path: PathBuf },

    /// Remove a flashcard's review state and history
    Forget { user: String, flashcard_id: i64 },
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "new".to_string())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let now = cli.now.unwrap_or_else(Utc::now);

    let config = match &cli.config {
        Some(path) => SchedulerConfig::from_path(path)?,
        None => SchedulerConfig::default(),
    };
    let scheduler = Scheduler::new(config)?;
    let mut conn = db::init_database(&cli.db)
        .with_context(|| format!("Failed to open {}", cli.db.display()))?;

    match cli.command {
        Command::Review {
            user,
            flashcard_id,
            quality,
        } => {
            let quality = parse_quality(&quality).map_err(anyhow::Error::msg)?;
            let state =
                db::record_review(&mut conn, &scheduler, &user, flashcard_id, quality, now)?;
            println!(
                "Flashcard {} due {} (interval {}, ease {:.2}, streak {})",
                flashcard_id,
                format_time(state.due_at),
                format_interval(state.interval_days),
                state.ease_factor,
                state.repetitions
            );
        }
        Command::Due { user, limit } => {
            let due = db::due_review_states(&conn, &user, now, Some(limit))?;
            println!("{} cards due", due.len());
            for (flashcard_id, state) in due {
                println!(
                    "  - {} (due {}, ease {:.2})",
                    flashcard_id,
                    format_time(state.due_at),
                    state.ease_factor
                );
            }
        }
        Command::Preview { user, flashcard_id } => {
            let state = db::load_review_state(&conn, &user, flashcard_id)?
                .unwrap_or_else(|| scheduler.new_state());
            for (button, interval) in scheduler.preview(&state, now)? {
                println!("{:<7} {}", button.label(), format_interval(interval));
            }
        }
        Command::Stats { user } => {
            let states = db::list_review_states(&conn, &user)?;
            let totals = db::review_totals(&conn, &user)?;
            let stats = StudyStats::from_states(
                states.iter().map(|(_, state)| state),
                now,
                scheduler.config().mastery_interval_days,
                totals,
            );
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Export { user, path } => {
            let export = ReviewExport::from_store(&conn, &user)?;
            export_json_to_path(&export, &path)?;
            println!("Exported {} cards to {}", export.cards.len(), path.display());
        }
        Command::Import { path } => {
            let export = import_json(&path)?;
            let restored = export.restore(&mut conn, &scheduler)?;
            println!("Restored {} cards for '{}'", restored, export.user);
        }
        Command::Forget { user, flashcard_id } => {
            if db::delete_review_state(&conn, &user, flashcard_id)? {
                println!("Removed flashcard {flashcard_id}");
            } else {
                println!("Flashcard {flashcard_id} has no review state");
            }
        }
    }

    Ok(())
}
