//! Moves in UCI long algebraic notation.

use crate::{Piece, Square};
use std::fmt;

/// A move as reported by an engine: source, destination and an optional
/// promotion piece ("e2e4", "e7e8q").
///
/// No legality is implied; this is a coordinate pair, not a rules-checked move.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct UciMove {
    from: Square,
    to: Square,
    promotion: Option<Piece>,
}

impl UciMove {
    /// Creates a move without promotion.
    #[inline]
    pub const fn new(from: Square, to: Square) -> Self {
        Self {
            from,
            to,
            promotion: None,
        }
    }

    /// Creates a promotion move.
    #[inline]
    pub const fn promoting(from: Square, to: Square, piece: Piece) -> Self {
        Self {
            from,
            to,
            promotion: Some(piece),
        }
    }

    /// Returns the source square.
    #[inline]
    pub const fn from(self) -> Square {
        self.from
    }

    /// Returns the destination square.
    #[inline]
    pub const fn to(self) -> Square {
        self.to
    }

    /// Returns the promotion piece, if any.
    #[inline]
    pub const fn promotion(self) -> Option<Piece> {
        self.promotion
    }

    /// Parses a move from UCI notation.
    ///
    /// Accepts four characters (from, to) or five (from, to, promotion letter).
    /// Promotion to a pawn or king is rejected.
    pub fn from_uci(s: &str) -> Option<Self> {
        if !s.is_ascii() || s.len() < 4 || s.len() > 5 {
            return None;
        }
        let from = Square::from_algebraic(&s[0..2])?;
        let to = Square::from_algebraic(&s[2..4])?;
        let promotion = match s.chars().nth(4) {
            Some(c) => match Piece::from_letter(c)? {
                Piece::Pawn | Piece::King => return None,
                piece => Some(piece),
            },
            None => None,
        };
        Some(Self {
            from,
            to,
            promotion,
        })
    }

    /// Returns the UCI notation for this move.
    pub fn to_uci(self) -> String {
        match self.promotion {
            Some(p) => format!("{}{}{}", self.from, self.to, p.letter()),
            None => format!("{}{}", self.from, self.to),
        }
    }
}

impl fmt::Debug for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UciMove({})", self.to_uci())
    }
}

impl fmt::Display for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uci())
    }
}
