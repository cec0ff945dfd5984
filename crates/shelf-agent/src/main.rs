//! A terminal chat with the book recommendation agent.

#[macro_use]
extern crate tracing;

use std::io::Write as _;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use shelf_agent::SessionBuilder;
use shelf_agent::chat::{ChatMessage, ChatRequest, MAX_MESSAGES, trim_transcript};
use shelf_agent::config::Settings;
use shelf_agent_model::ToolCallRequest;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("{err}");
            return;
        }
    };

    let (tool_call_tx, mut tool_call_rx) = mpsc::unbounded_channel();
    let session = SessionBuilder::from_settings(settings)
        .on_tool_call(move |call: &ToolCallRequest| {
            tool_call_tx.send(call.clone()).ok();
        })
        .build();
    let session = match session {
        Ok(session) => session,
        Err(err) => {
            eprintln!("failed to start session: {err}");
            return;
        }
    };

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut transcript: Vec<ChatMessage> = Vec::new();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        transcript.push(ChatMessage::user(line));
        // Forget the oldest exchanges once the transcript is too long to send.
        trim_transcript(&mut transcript, MAX_MESSAGES);

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message("🤔 Thinking...");

        let reply = session.reply(ChatRequest {
            messages: transcript.clone(),
        });
        tokio::pin!(reply);

        let result = loop {
            progress_bar.inc(1);
            select! {
                result = &mut reply => break result,
                Some(call) = tool_call_rx.recv() => {
                    progress_bar.suspend(|| print_tool_call(&call));
                }
                _ = sleep(Duration::from_millis(100)) => {}
            }
        };
        progress_bar.finish_and_clear();
        while let Ok(call) = tool_call_rx.try_recv() {
            print_tool_call(&call);
        }

        match result {
            Ok(reply) => {
                println!("{}🤖 {}", BAR_CHAR.bright_cyan(), reply.reply.bright_white());
                transcript.push(ChatMessage::assistant(reply.reply));
            }
            Err(err) => {
                println!("{}⚠️  {}", BAR_CHAR.bright_red(), err.to_string().red());
                // Let the user ask again without the unanswered message.
                transcript.pop();
            }
        }
        println!();
    }
}

fn print_tool_call(call: &ToolCallRequest) {
    println!(
        "{}🔎 {} {}",
        BAR_CHAR.bright_yellow(),
        call.name.bright_white().bold(),
        call.arguments.dimmed()
    );
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
