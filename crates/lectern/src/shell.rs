// SPDX-FileCopyrightText: 2026 Lectern Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lectern shell` command implementation.
//!
//! Interactive REPL with a colored prompt and readline history. Each
//! invocation starts a fresh session; `/new` starts another one without
//! leaving the shell.

use colored::Colorize;
use lectern_agent::LecternEngine;
use lectern_core::types::ContextFlag;
use lectern_core::{LecternError, SessionId, UserId};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::bootstrap::user_facing_error;

/// A line typed at the shell prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum ShellInput<'a> {
    Quit,
    NewSession,
    Library,
    Help,
    Empty,
    Message(&'a str),
}

/// Classify one line of shell input.
pub fn parse_line(line: &str) -> ShellInput<'_> {
    match line.trim() {
        "" => ShellInput::Empty,
        "/quit" | "/exit" => ShellInput::Quit,
        "/new" => ShellInput::NewSession,
        "/library" => ShellInput::Library,
        "/help" => ShellInput::Help,
        message => ShellInput::Message(message),
    }
}

fn new_session() -> SessionId {
    SessionId(uuid::Uuid::new_v4().to_string())
}

/// Runs the interactive REPL for `user_id` until `/quit`, Ctrl+C or Ctrl+D.
pub async fn run_shell(engine: &LecternEngine, user_id: UserId) -> Result<(), LecternError> {
    let mut rl = DefaultEditor::new()
        .map_err(|e| LecternError::Internal(format!("failed to initialize readline: {e}")))?;

    let mut session = new_session();
    println!("{}", "lectern shell".bold().green());
    println!(
        "Chatting as {}. Type {} for commands, {} to exit.\n",
        user_id.as_str().cyan(),
        "/help".yellow(),
        "/quit".yellow()
    );

    let prompt = format!("{}> ", "lectern".green());
    loop {
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        };

        match parse_line(&line) {
            ShellInput::Quit => break,
            ShellInput::Empty => continue,
            ShellInput::Help => {
                println!("  /library  list uploaded books");
                println!("  /new      start a new session");
                println!("  /quit     leave the shell");
            }
            ShellInput::NewSession => {
                session = new_session();
                println!("{}", "started a new session".dimmed());
            }
            ShellInput::Library => match engine.list_library(&user_id).await {
                Ok(books) if books.is_empty() => println!("{}", "no books uploaded yet".dimmed()),
                Ok(books) => {
                    for book in books {
                        println!("{} ({} chunks)", book.book_id.bold(), book.chunk_count);
                    }
                }
                Err(e) => eprintln!("{}: {e}", "error".red()),
            },
            ShellInput::Message(message) => {
                let _ = rl.add_history_entry(message);
                match engine.handle_message(&user_id, &session, message).await {
                    Ok((answer, state)) => {
                        println!("{answer}");
                        if state.has_flag(ContextFlag::Degraded) {
                            println!("{}", "(answered without full document access)".dimmed());
                        }
                        println!();
                    }
                    Err(e) => eprintln!("{}", user_facing_error(&e).yellow()),
                }
            }
        }
    }

    println!("{}", "goodbye".dimmed());
    Ok(())
}
