//! Engine process management.

use chess_analysis::{ChannelError, Transport};
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uci::GuiCommand;

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Empty engine command")]
    EmptyCommand,
    #[error("Failed to start engine: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to open engine {0}")]
    MissingPipe(&'static str),
}

/// A running engine process.
///
/// Lines written through [`EngineTransport`] go to the engine's stdin; every
/// line the engine prints is forwarded to the `output_tx` given at spawn.
/// The output channel closes when the engine's stdout does.
pub struct EngineProcess {
    child: Child,
    stdin_tx: mpsc::Sender<String>,
}

impl EngineProcess {
    /// Spawn the engine process.
    pub fn spawn(command: &str, output_tx: mpsc::Sender<String>) -> Result<Self, SpawnError> {
        // Parse command and args
        let parts: Vec<&str> = command.split_whitespace().collect();
        let (program, args) = parts.split_first().ok_or(SpawnError::EmptyCommand)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or(SpawnError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(SpawnError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(SpawnError::MissingPipe("stderr"))?;
        debug!(%program, pid = ?child.id(), "engine started");

        // Channel for sending commands to stdin
        let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(100);

        let mut stdin_writer = stdin;
        tokio::spawn(async move {
            while let Some(cmd) = stdin_rx.recv().await {
                if stdin_writer.write_all(cmd.as_bytes()).await.is_err() {
                    break;
                }
                if stdin_writer.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdin_writer.flush().await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if output_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                trace!(%line, "engine stderr");
            }
        });

        Ok(EngineProcess { child, stdin_tx })
    }

    /// A handle the analysis pipeline writes commands through.
    pub fn transport(&self) -> EngineTransport {
        EngineTransport {
            tx: self.stdin_tx.clone(),
        }
    }

    /// Stop the engine process.
    pub async fn stop(mut self) {
        // Try graceful shutdown first
        let _ = self.stdin_tx.send(GuiCommand::Quit.to_uci()).await;

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        // Force kill if still running
        let _ = self.child.kill().await;
        debug!("engine stopped");
    }
}

/// Non-blocking write side of an [`EngineProcess`].
#[derive(Debug, Clone)]
pub struct EngineTransport {
    tx: mpsc::Sender<String>,
}

impl Transport for EngineTransport {
    fn send_line(&mut self, line: String) -> Result<(), ChannelError> {
        self.tx.try_send(line).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::Full,
            mpsc::error::TrySendError::Closed(_) => ChannelError::Closed,
        })
    }
}
