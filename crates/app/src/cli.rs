use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quiz_core::model::SessionMode;

#[derive(Parser, Debug)]
#[command(name = "radprep")]
#[command(about = "Local question bank with practice and mock-exam sessions")]
#[command(version)]
pub struct Args {
    /// SQLite database URL or file path
    #[arg(long = "db", env = "RADPREP_DB_URL", default_value = "sqlite://radprep.sqlite3")]
    pub db_url: String,

    /// Questions drawn into a fresh session
    #[arg(long, env = "RADPREP_SESSION_SIZE", default_value_t = 20)]
    pub session_size: usize,

    /// Log filter used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Insert the starter questions if the bank is empty
    Seed,
    /// Import questions from a JSON file (array or single object)
    Import { file: PathBuf },
    /// Export the whole bank as JSON
    Export {
        /// Destination file; defaults to radprep_export_<date>.json
        path: Option<PathBuf>,
    },
    /// Delete every question in the bank
    ClearBank,
    /// List chapters with question counts
    Chapters,
    /// Search question text and chapters
    Search {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// List bookmarked questions
    Bookmarks {
        /// Remove the bookmark of this question id
        #[arg(long)]
        remove: Option<u64>,
    },
    /// List completed attempts, most recent first
    History,
    /// Accuracy per chapter
    Analytics,
    /// Overview of the bank, recent attempts and the pending session
    Dashboard,
    /// Start or resume an interactive quiz
    Quiz {
        #[arg(long, value_parser = parse_mode, default_value = "practice")]
        mode: SessionMode,
        /// Restrict the session to one chapter
        #[arg(long)]
        chapter: Option<String>,
    },
}

fn parse_mode(raw: &str) -> Result<SessionMode, String> {
    raw.parse::<SessionMode>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_arguments_parse() {
        let args = Args::try_parse_from([
            "radprep",
            "--db",
            "sqlite::memory:",
            "quiz",
            "--mode",
            "mock",
            "--chapter",
            "Radiation Physics",
        ])
        .unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        match args.command {
            Command::Quiz { mode, chapter } => {
                assert_eq!(mode, SessionMode::Mock);
                assert_eq!(chapter.as_deref(), Some("Radiation Physics"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Args::try_parse_from(["radprep", "quiz", "--mode", "exam"]).is_err());
    }

    #[test]
    fn search_joins_words() {
        let args = Args::try_parse_from(["radprep", "search", "absorbed", "dose"]).unwrap();
        let Command::Search { query } = args.command else {
            panic!("expected search");
        };
        assert_eq!(query.join(" "), "absorbed dose");
    }
}
