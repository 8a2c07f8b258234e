//! UCI commands sent from the GUI side to an engine.

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if engine is ready.
    IsReady,
    /// Reset engine state before analysing an unrelated position.
    UciNewGame,
    /// Set up a position from its FEN.
    Position { fen: String },
    /// Search to a fixed depth.
    Go { depth: u32 },
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
}

impl GuiCommand {
    /// `position fen <fen>`.
    pub fn position_fen(fen: impl Into<String>) -> Self {
        GuiCommand::Position { fen: fen.into() }
    }

    /// `go depth <depth>`.
    pub fn go_depth(depth: u32) -> Self {
        GuiCommand::Go { depth }
    }

    /// Format the command as a single protocol line (without newline).
    pub fn to_uci(&self) -> String {
        match self {
            GuiCommand::Uci => "uci".to_string(),
            GuiCommand::IsReady => "isready".to_string(),
            GuiCommand::UciNewGame => "ucinewgame".to_string(),
            GuiCommand::Position { fen } => format!("position fen {}", fen),
            GuiCommand::Go { depth } => format!("go depth {}", depth),
            GuiCommand::Stop => "stop".to_string(),
            GuiCommand::Quit => "quit".to_string(),
        }
    }
}
