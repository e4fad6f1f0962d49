// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lectern - chat with your uploaded documents.
//!
//! This is the binary entry point.

mod bootstrap;
mod ingest;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use lectern_config::LecternConfig;
use lectern_core::{LecternError, SessionId, UserId};

/// Lectern - chat with your uploaded documents.
#[derive(Parser, Debug)]
#[command(name = "lectern", version, about, long_about = None)]
struct Cli {
    /// Configuration file to load instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question and print the answer.
    Ask {
        #[arg(long, short)]
        user: String,
        #[arg(long, short, default_value = "default")]
        session: String,
        /// The question.
        message: String,
    },
    /// Upload a plain-text file as a book.
    Ingest {
        #[arg(long, short)]
        user: String,
        /// Book id; defaults to the file name without extension.
        #[arg(long, short)]
        book: Option<String>,
        /// Maximum characters per chunk.
        #[arg(long, default_value_t = ingest::DEFAULT_CHUNK_CHARS)]
        chunk_chars: usize,
        path: PathBuf,
    },
    /// List the books a user has uploaded.
    Library {
        #[arg(long, short)]
        user: String,
    },
    /// Launch an interactive REPL session.
    Shell {
        #[arg(long, short)]
        user: String,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => lectern_config::load_and_validate_path(path),
        None => lectern_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            lectern_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    bootstrap::init_tracing(&config.agent.log_level);
    lectern_agent::recording::register_metrics();

    if let Err(e) = run(cli.command, config).await {
        eprintln!("{}: {}", "error".red(), bootstrap::user_facing_error(&e));
        std::process::exit(1);
    }
}

async fn run(command: Option<Commands>, config: LecternConfig) -> Result<(), LecternError> {
    let Some(command) = command else {
        println!("lectern: use --help for available commands");
        return Ok(());
    };

    match command {
        Commands::Config => {
            let rendered = toml::to_string_pretty(&bootstrap::redacted(&config))
                .map_err(|e| LecternError::Internal(format!("failed to render config: {e}")))?;
            print!("{rendered}");
        }
        Commands::Ask {
            user,
            session,
            message,
        } => {
            let engine = bootstrap::build_engine(&config)?;
            let (answer, _) = engine
                .handle_message(&UserId::new(user), &SessionId(session), &message)
                .await?;
            println!("{answer}");
        }
        Commands::Ingest {
            user,
            book,
            chunk_chars,
            path,
        } => {
            let engine = bootstrap::build_engine(&config)?;
            let book = book.unwrap_or_else(|| ingest::book_id_for(&path));
            let stored =
                ingest::ingest_file(&engine, &UserId::new(user), &book, &path, chunk_chars)
                    .await?;
            println!("uploaded {stored} chunks as {}", book.bold());
        }
        Commands::Library { user } => {
            let engine = bootstrap::build_engine(&config)?;
            let books = engine.list_library(&UserId::new(user)).await?;
            if books.is_empty() {
                println!("no books uploaded yet");
            }
            for book in books {
                println!("{} ({} chunks)", book.book_id.bold(), book.chunk_count);
                let preview: String = book.preview.chars().take(120).collect();
                println!("  {}", preview.dimmed());
            }
        }
        Commands::Shell { user } => {
            let engine = bootstrap::build_engine(&config)?;
            shell::run_shell(&engine, UserId::new(user)).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_loads_config_defaults() {
        let config = lectern_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.agent.name, "lectern");
    }

    #[test]
    fn cli_parses_ask() {
        let cli = Cli::try_parse_from([
            "lectern",
            "ask",
            "--user",
            "u1",
            "explain chapter 2",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ask {
                user,
                session,
                message,
            }) => {
                assert_eq!(user, "u1");
                assert_eq!(session, "default");
                assert_eq!(message, "explain chapter 2");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_accepts_global_config_after_subcommand() {
        let cli = Cli::try_parse_from([
            "lectern",
            "ingest",
            "-u",
            "u1",
            "notes.txt",
            "--config",
            "lectern.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("lectern.toml")));
        assert!(matches!(
            cli.command,
            Some(Commands::Ingest { chunk_chars: ingest::DEFAULT_CHUNK_CHARS, .. })
        ));
    }

    #[test]
    fn ask_requires_a_user() {
        assert!(Cli::try_parse_from(["lectern", "ask", "hello"]).is_err());
    }

    #[test]
    fn default_config_renders_as_toml() {
        let rendered = toml::to_string_pretty(&bootstrap::redacted(&LecternConfig::default())).unwrap();
        assert!(rendered.contains("[llm]"));
        assert!(rendered.contains("[vector_store]"));
    }
}
