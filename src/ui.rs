//! Console front end: status and transcript lines on stdout, and a line-based
//! REPL that feeds the assistant.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::assistant::Assistant;
use crate::error::Result;
use crate::interfaces::status::{AssistantStatus, StatusSink};

const HELP: &str = "Type a message and press Enter.\n  /voice <file>  send a recorded audio file\n  /clear         forget the conversation\n  /help          show this help\n  /quit          leave";

#[derive(Debug, Default)]
pub struct ConsoleFrontend {
    last_status: Mutex<Option<AssistantStatus>>,
    show_status: bool,
}

impl ConsoleFrontend {
    pub fn new(show_status: bool) -> Self {
        Self {
            last_status: Mutex::new(None),
            show_status,
        }
    }

    fn print(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }

    fn prompt(&self) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "> ");
        let _ = stdout.flush();
    }
}

impl StatusSink for ConsoleFrontend {
    fn set_status(&self, status: AssistantStatus) {
        let changed = match self.last_status.lock() {
            Ok(mut last) => last.replace(status) != Some(status),
            Err(_) => true,
        };
        if self.show_status && changed && status != AssistantStatus::Available {
            self.print(&format!("[{status}]"));
        }
    }

    fn show_text(&self, text: &str) {
        self.print(text);
    }
}

enum ReplCommand<'a> {
    Say(&'a str),
    Voice(&'a Path),
    Clear,
    Help,
    Quit,
}

fn parse_line(line: &str) -> ReplCommand<'_> {
    let line = line.trim();
    match line {
        "/quit" | "/exit" => ReplCommand::Quit,
        "/clear" => ReplCommand::Clear,
        "/help" => ReplCommand::Help,
        _ => match line.strip_prefix("/voice ") {
            Some(path) => ReplCommand::Voice(Path::new(path.trim())),
            None => ReplCommand::Say(line),
        },
    }
}

/// Waits for background image jobs, printing saved files. Returns how many
/// files were saved.
pub async fn finish_image_jobs(
    frontend: &ConsoleFrontend,
    jobs: Vec<JoinHandle<Result<Vec<PathBuf>>>>,
) -> usize {
    if jobs.is_empty() {
        return 0;
    }
    frontend.print(&format!("Waiting for {} image job(s) to finish...", jobs.len()));
    let mut saved = 0;
    for job in jobs {
        match job.await {
            Ok(Ok(paths)) => {
                for path in paths {
                    frontend.print(&format!("Saved {}", path.display()));
                    saved += 1;
                }
            }
            Ok(Err(err)) => frontend.print(&format!("Image generation failed: {err}")),
            Err(err) => warn!(error = %err, "Image job did not complete"),
        }
    }
    saved
}

/// Reads stdin until EOF, `/quit` or an exit intent, then waits for image
/// jobs started along the way.
pub async fn run_console(assistant: &Assistant, frontend: &ConsoleFrontend) -> Result<()> {
    frontend.print(&assistant.initial_transcript()?);
    frontend.print(HELP);

    let mut image_jobs = Vec::new();
    let result = repl(assistant, frontend, &mut image_jobs).await;
    finish_image_jobs(frontend, image_jobs).await;
    result
}

async fn repl(
    assistant: &Assistant,
    frontend: &ConsoleFrontend,
    image_jobs: &mut Vec<JoinHandle<Result<Vec<PathBuf>>>>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        frontend.prompt();
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let outcome = match parse_line(&line) {
            ReplCommand::Quit => break,
            ReplCommand::Help => {
                frontend.print(HELP);
                continue;
            }
            ReplCommand::Clear => {
                assistant.chat_log().clear()?;
                frontend.print("Conversation cleared.");
                continue;
            }
            ReplCommand::Say("") => continue,
            ReplCommand::Say(text) => assistant.handle_turn(text).await,
            ReplCommand::Voice(path) => assistant.handle_audio_file(path).await,
        };
        match outcome {
            Ok(mut outcome) => {
                image_jobs.retain(|job| !job.is_finished());
                image_jobs.append(&mut outcome.image_jobs);
                for task in outcome.automation.iter().filter(|task| !task.success) {
                    frontend.print(&format!("(could not {}: {})", task.intent, task.detail));
                }
                if outcome.exit {
                    break;
                }
            }
            Err(err) => {
                warn!(error = %err, "Turn failed");
                frontend.print(&format!("Error: {err}"));
            }
        }
    }
    Ok(())
}
