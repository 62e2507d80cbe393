//! Line-based console channel
//!
//! Each line read from stdin becomes a plaintext message for one
//! conversation; replies are printed to stdout.

use super::{Channel, ChannelError, StopHandle};
use crate::config::ConsoleConfig;
use crate::engine::Engine;
use crate::model::{IncomingMessage, IncomingMessageType, Step};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

const EXIT_COMMAND: &str = "exit";

/// Console transport for local testing of flows
pub struct ConsoleChannel {
    config: ConsoleConfig,
    shutdown: CancellationToken,
    started: AtomicBool,
}

impl ConsoleChannel {
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
        }
    }

    /// Cancelled when the user exits, input ends, or the engine stops
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl Channel for ConsoleChannel {
    fn name(&self) -> &'static str {
        "console"
    }

    fn start(&self, engine: Arc<Engine>) -> Result<Option<StopHandle>, ChannelError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ChannelError::AlreadyStarted(self.name().to_string()));
        }

        let conversation_id = self.config.conversation_id.clone();
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            let stdout = tokio::io::stdout();
            if let Err(e) = run(&engine, &conversation_id, stdin, stdout, shutdown.clone()).await {
                tracing::error!(error = %e, "Console channel failed");
            }
            shutdown.cancel();
        });

        Ok(Some(StopHandle::from(self.shutdown.clone())))
    }
}

/// Read lines until `exit`, end of input, or `shutdown`, answering each one
pub async fn run<R, W>(
    engine: &Engine,
    conversation_id: &str,
    reader: R,
    mut writer: W,
    shutdown: CancellationToken,
) -> Result<(), ChannelError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(b"Initialized\n").await?;
    let mut lines = reader.lines();

    loop {
        writer.write_all(b"> ").await?;
        writer.flush().await?;

        let line = tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim() == EXIT_COMMAND {
            break;
        }

        let reply = match engine
            .process_message(conversation_id, IncomingMessage::plaintext(line))
            .await
        {
            Ok(step) => format_reply(step.as_ref()),
            Err(e) => format!("Error: {e}\n"),
        };
        writer.write_all(reply.as_bytes()).await?;
    }

    writer.flush().await?;
    Ok(())
}

/// Render a step the way the console shows it
pub fn format_reply(step: Option<&Step>) -> String {
    let mut out = String::from("Response:\n");
    let Some(step) = step else {
        return out;
    };

    for message in &step.messages {
        match message.as_text() {
            Some(text) => {
                let _ = writeln!(out, "{text}");
            }
            None => {
                let _ = writeln!(out, "{}", pretty(message));
            }
        }
    }

    out.push_str("\nPossible responses:\n");
    for response in &step.responses {
        match (&response.kind, &response.text) {
            (IncomingMessageType::Plaintext, Some(text)) => {
                let _ = writeln!(out, "{text}");
            }
            _ => {
                let _ = writeln!(out, "{}", pretty(response));
            }
        }
    }

    out
}

fn pretty(value: &impl serde::Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}
