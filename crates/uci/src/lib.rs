//! UCI (Universal Chess Interface) protocol library.
//!
//! This crate provides types and parsing for the UCI protocol as seen from
//! the GUI side: commands are formatted for an engine, and the engine's
//! output lines are parsed into structured messages.
//!
//! # Commands sent to the engine
//!
//! - `uci` / `isready` - Handshake
//! - `ucinewgame` - Reset state before an unrelated position
//! - `position fen <fen>` - Set position
//! - `go depth <d>` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine
//!
//! # Engine output understood
//!
//! - `id name|author ...`, `uciok`, `readyok`
//! - `info ...` - see [`EngineInfo`]
//! - `bestmove <move> [ponder <move>]`

mod command;
mod info;

pub use command::GuiCommand;
pub use info::{EngineInfo, InfoBuilder, Score, MATE_CP, MAX_MATE_DISTANCE};

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Search finished. `mv` is `None` when the engine reports `(none)`.
    BestMove { mv: Option<String>, ponder: Option<String> },
}

impl EngineMessage {
    /// Parse one line of engine output.
    ///
    /// Returns `None` for anything outside the grammar above; engines are free
    /// to print auxiliary output, so an unknown line is not an error.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next()? {
            "info" => EngineInfo::parse(line).map(EngineMessage::Info),
            "bestmove" => {
                let mv = parts
                    .next()
                    .filter(|m| *m != "(none)")
                    .map(str::to_string);
                let ponder = match parts.next() {
                    Some("ponder") => parts.next().map(str::to_string),
                    _ => None,
                };
                Some(EngineMessage::BestMove { mv, ponder })
            }
            "uciok" => Some(EngineMessage::UciOk),
            "readyok" => Some(EngineMessage::ReadyOk),
            "id" => {
                let key = parts.next()?;
                let value = parts.collect::<Vec<_>>().join(" ");
                match key {
                    "name" => Some(EngineMessage::Id {
                        name: Some(value),
                        author: None,
                    }),
                    "author" => Some(EngineMessage::Id {
                        name: None,
                        author: Some(value),
                    }),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => {
                let mv = mv.as_deref().unwrap_or("(none)");
                match ponder {
                    Some(p) => format!("bestmove {} ponder {}", mv, p),
                    None => format!("bestmove {}", mv),
                }
            }
        }
    }
}
