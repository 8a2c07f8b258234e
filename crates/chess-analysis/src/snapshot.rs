//! Raw board observations as scraped from a rendered board.

use chess_core::{Color, Piece, Square};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anything that can be resolved to a colored piece.
///
/// Resolution never fails: an indeterminate color is White and an
/// indeterminate kind is a pawn, since the rendered board can be briefly
/// inconsistent while it redraws.
pub trait PieceSource {
    fn resolve(&self) -> (Color, Piece);
}

/// A loosely typed piece signal attached to one square.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceObservation {
    /// Compact code: color first, kind letter last ("wK", "bq", "wP").
    Code(String),
    /// Descriptive style tokens ("piece", "black", "knight").
    Tokens(Vec<String>),
}

impl PieceObservation {
    pub fn code(code: impl Into<String>) -> Self {
        PieceObservation::Code(code.into())
    }

    /// Splits a whitespace-separated class attribute into tokens.
    pub fn classes(classes: &str) -> Self {
        PieceObservation::Tokens(classes.split_whitespace().map(str::to_string).collect())
    }
}

impl PieceSource for PieceObservation {
    fn resolve(&self) -> (Color, Piece) {
        match self {
            PieceObservation::Code(code) => resolve_code(code),
            PieceObservation::Tokens(tokens) => resolve_tokens(tokens),
        }
    }
}

fn resolve_code(code: &str) -> (Color, Piece) {
    let code = code.trim();
    let Some(first) = code.chars().next() else {
        return (Color::White, Piece::Pawn);
    };
    let color = if first.eq_ignore_ascii_case(&'w') {
        Color::White
    } else {
        Color::Black
    };
    let kind = code
        .chars()
        .last()
        .and_then(Piece::from_letter)
        .unwrap_or(Piece::Pawn);
    (color, kind)
}

/// Two-character tokens like "wn" or "bq".
fn compact_token(token: &str) -> Option<(Color, Piece)> {
    let mut chars = token.chars();
    let color = match chars.next()?.to_ascii_lowercase() {
        'w' => Color::White,
        'b' => Color::Black,
        _ => return None,
    };
    let kind = Piece::from_letter(chars.next()?)?;
    chars.next().is_none().then_some((color, kind))
}

fn color_token(token: &str) -> Option<Color> {
    // "bishop" and "b" name a piece, not a color
    if Piece::from_name(token).is_some() {
        return None;
    }
    match token.chars().next()?.to_ascii_lowercase() {
        'w' => Some(Color::White),
        'b' => Some(Color::Black),
        _ => None,
    }
}

fn resolve_tokens(tokens: &[String]) -> (Color, Piece) {
    let color = tokens
        .iter()
        .find_map(|t| color_token(t))
        .unwrap_or(Color::White);
    let kind = tokens
        .iter()
        .find_map(|t| Piece::from_name(t))
        .or_else(|| tokens.iter().find_map(|t| compact_token(t)).map(|(_, p)| p))
        .unwrap_or(Piece::Pawn);
    (color, kind)
}

/// Every occupied square of a rendered board plus the move-list ply signal.
///
/// Built fresh for each extraction. Squares without an observation are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawSnapshot")]
pub struct BoardSnapshot {
    pieces: BTreeMap<Square, PieceObservation>,
    max_ply: u32,
}

impl BoardSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observation on `square`, replacing any earlier one.
    pub fn place(&mut self, square: Square, observation: PieceObservation) -> &mut Self {
        self.pieces.insert(square, observation);
        self
    }

    /// Clears `square`.
    pub fn remove(&mut self, square: Square) -> Option<PieceObservation> {
        self.pieces.remove(&square)
    }

    pub fn set_max_ply(&mut self, max_ply: u32) -> &mut Self {
        self.max_ply = max_ply;
        self
    }

    pub fn get(&self, square: Square) -> Option<&PieceObservation> {
        self.pieces.get(&square)
    }

    /// Highest ply marker found in the move list, zero when there is none.
    pub fn max_ply(&self) -> u32 {
        self.max_ply
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }
}

/// Wire form: `{"squares": {"e1": {"code": "wK"}}, "plies": [0, 1]}`.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    squares: BTreeMap<String, Option<PieceObservation>>,
    #[serde(default)]
    plies: Vec<i64>,
}

impl From<RawSnapshot> for BoardSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        let pieces = raw
            .squares
            .into_iter()
            .filter_map(|(name, obs)| Some((Square::from_algebraic(name.trim())?, obs?)))
            .collect();
        let max_ply = raw
            .plies
            .into_iter()
            .max()
            .map(|p| p.clamp(0, i64::from(u32::MAX)) as u32)
            .unwrap_or(0);
        BoardSnapshot { pieces, max_ply }
    }
}
