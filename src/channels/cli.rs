//! CLI channel: stdin/stdout REPL for local testing.
//!
//! Plain lines are text messages. A line starting with `#` presses the
//! inline button whose payload follows, e.g. `#dept:1` or `#fav:add:2`.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, EventStream, InboundEvent};
use crate::error::ChannelError;
use crate::render::{Button, Keyboard, Outgoing};
use crate::store::UserId;

/// Identity used for everything typed on the terminal.
pub const CLI_USER_ID: UserId = 1;

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel {
    user_id: UserId,
    handle: String,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            user_id: CLI_USER_ID,
            handle: "local-user".to_string(),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn one terminal line into an event. Blank lines yield `None`.
fn parse_line(line: &str, user_id: UserId, handle: &str) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let event = match line.strip_prefix('#') {
        Some(payload) => InboundEvent::button("cli", user_id, user_id, payload.trim()),
        None => InboundEvent::text("cli", user_id, user_id, line),
    };
    Some(event.with_handle(handle))
}

fn format_buttons(rows: &[Vec<Button>]) -> String {
    rows.iter()
        .map(|row| {
            row.iter()
                .map(|b| format!("[{} #{}]", b.label, b.payload))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_keyboard(keyboard: &Keyboard) -> Option<String> {
    match keyboard {
        Keyboard::None => None,
        Keyboard::Menu(rows) => Some(
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|label| format!("({label})"))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        Keyboard::Inline(rows) => Some(format_buttons(rows)),
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let user_id = self.user_id;
        let handle = self.handle.clone();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let Some(event) = parse_line(&line, user_id, &handle) else {
                            eprint!("> ");
                            continue;
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        _event: &InboundEvent,
        replies: Vec<Outgoing>,
    ) -> Result<(), ChannelError> {
        for reply in replies {
            match reply {
                Outgoing::Send(request) | Outgoing::Replace(request) => {
                    println!("\n{}", request.text);
                    if let Some(keys) = format_keyboard(&request.keyboard) {
                        println!("{keys}");
                    }
                }
                Outgoing::ReplaceButtons { buttons, .. } => {
                    println!("{}", format_buttons(&buttons));
                }
                Outgoing::Notice(text) => eprintln!("ℹ️  {text}"),
            }
        }
        eprint!("\n> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
