use std::fmt;

use clap::Parser;
use quiz_core::model::QuestionId;
use services::{AppServices, Clock};
use tracing_subscriber::{EnvFilter, fmt as log_fmt, prelude::*};

mod cli;
mod quiz_loop;

use cli::{Args, Command};

#[derive(Debug)]
enum ArgsError {
    InvalidDbUrl { raw: String },
    InvalidSessionSize,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSessionSize => write!(f, "--session-size must be at least 1"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(log_fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    if args.db_url.trim().is_empty() {
        return Err(ArgsError::InvalidDbUrl { raw: args.db_url }.into());
    }
    if args.session_size == 0 {
        return Err(ArgsError::InvalidSessionSize.into());
    }
    let db_url = normalize_sqlite_url(args.db_url);

    // sqlx will not create the file itself; migrations run inside `AppServices`.
    prepare_sqlite_file(&db_url)?;
    let services = AppServices::new_sqlite(&db_url, Clock::system())
        .await?
        .with_session_size(args.session_size);

    match args.command {
        Command::Seed => {
            if services.seeded() == 0 {
                println!("Question bank already has questions; nothing seeded.");
            } else {
                println!("Seeded {} starter questions.", services.seeded());
            }
        }
        Command::Import { file } => {
            let json = std::fs::read_to_string(&file)?;
            let source = file
                .file_name()
                .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
            let report = services.vault().import_json(&source, &json).await?;
            println!("Imported {} question(s) from {source}.", report.added());
        }
        Command::Export { path } => {
            let json = services.vault().export_json().await?;
            let path = path.unwrap_or_else(|| services.vault().export_file_name().into());
            std::fs::write(&path, json)?;
            println!("Exported question bank to {}.", path.display());
        }
        Command::ClearBank => {
            let removed = services.bank().clear().await?;
            println!("Removed {removed} question(s).");
        }
        Command::Chapters => {
            let chapters = services.bank().chapters().await?;
            if chapters.is_empty() {
                println!("No chapters yet. Import a question bank first.");
            }
            for chapter in chapters {
                println!("{:>4}  {}", chapter.questions, chapter.name);
            }
        }
        Command::Search { query } => {
            let query = query.join(" ");
            let found = services.bank().search(&query).await?;
            println!("{} match(es) for \"{}\"", found.len(), query.trim());
            for question in found {
                println!(
                    "#{:<5} [{}] {}",
                    question.id().value(),
                    question.chapter(),
                    question.text()
                );
                if let Some(answer) = question.correct_option() {
                    println!("        answer: {answer}");
                }
            }
        }
        Command::Bookmarks { remove } => {
            if let Some(id) = remove {
                services.bookmarks().remove(QuestionId::new(id)).await?;
                println!("Removed bookmark #{id}.");
            }
            let questions = services.bookmarks().list().await?;
            if questions.is_empty() {
                println!("No bookmarks.");
            }
            for question in questions {
                println!(
                    "#{:<5} [{}] {}",
                    question.id().value(),
                    question.chapter(),
                    question.text()
                );
                if let Some(answer) = question.correct_option() {
                    println!("        answer: {answer}");
                }
            }
        }
        Command::History => {
            let attempts = services.history().list().await?;
            if attempts.is_empty() {
                println!("No attempts yet.");
            }
            for attempt in attempts {
                println!(
                    "{}  {:<8} {:>3}/{:<3} {:>3}%  {}",
                    attempt.completed_at().format("%Y-%m-%d %H:%M"),
                    attempt.mode().as_str(),
                    attempt.score(),
                    attempt.total(),
                    attempt.percentage(),
                    attempt.chapter()
                );
            }
        }
        Command::Analytics => {
            let analytics = services.history().analytics().await?;
            println!(
                "{} attempt(s), {} chapter(s) mastered",
                analytics.attempts,
                analytics.mastered()
            );
            for chapter in &analytics.chapters {
                println!(
                    "{:>3}%  {:<10} {:>4}/{:<4} {}",
                    chapter.accuracy,
                    chapter.band.label(),
                    chapter.correct,
                    chapter.total,
                    chapter.chapter
                );
            }
        }
        Command::Dashboard => {
            let dashboard = services.history().dashboard().await?;
            println!("Questions:     {}", dashboard.questions);
            println!("Attempts:      {}", dashboard.attempts);
            println!("Average score: {}%", dashboard.average_score);
            if let Some(pending) = &dashboard.pending {
                println!(
                    "Pending:       {} {} (question {}/{}, {} answered)",
                    pending.mode(),
                    pending.chapter().unwrap_or("all chapters"),
                    pending.current_idx() + 1,
                    pending.question_ids().len(),
                    pending.answered()
                );
            }
            if !dashboard.recent.is_empty() {
                println!("Recent:");
                for attempt in &dashboard.recent {
                    println!(
                        "  {:>3}%  {} {}/{}  {}",
                        attempt.percentage(),
                        attempt.mode(),
                        attempt.score(),
                        attempt.total(),
                        attempt.chapter()
                    );
                }
            }
            if !dashboard.chapters.is_empty() {
                println!("Chapters:");
                for chapter in &dashboard.chapters {
                    println!("  {:>4}  {}", chapter.questions, chapter.name);
                }
            }
        }
        Command::Quiz { mode, chapter } => {
            let mut engine = services.session_engine();
            quiz_loop::run(&mut engine, mode, chapter.as_deref()).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
