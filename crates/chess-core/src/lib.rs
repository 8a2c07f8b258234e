//! Core types for chess.
//!
//! This crate provides the fundamental types shared across the workspace:
//! - [`Piece`] and [`Color`] for piece representation
//! - [`Square`], [`File`], and [`Rank`] for board coordinates
//! - [`UciMove`] for engine move notation
//! - FEN parsing and serialization ([`Fen`], [`CastlingRights`])

mod color;
mod fen;
mod mov;
mod piece;
mod square;

pub use color::Color;
pub use fen::{CastlingRights, Fen, FenError};
pub use mov::UciMove;
pub use piece::Piece;
pub use square::{File, Rank, Square};
