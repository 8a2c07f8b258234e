//! Position extraction: raw board snapshot to FEN.
//!
//! A static snapshot carries no move history, so some FEN fields are
//! approximations:
//! - castling rights only check that king and rook stand on their home squares
//! - the en passant target is always `-`
//! - the halfmove clock is always `0`

use crate::snapshot::{BoardSnapshot, PieceSource};
use chess_core::{CastlingRights, Color, Fen, File, Piece, Square};

/// Resolved occupancy indexed by `Square::index` (a8 first).
type Board = [Option<(Color, Piece)>; 64];

/// Derives the FEN for a snapshot.
///
/// Pure and infallible: identical snapshots always give identical FENs.
pub fn extract(snapshot: &BoardSnapshot) -> Fen {
    let board = resolve_board(snapshot);
    let max_ply = snapshot.max_ply();

    Fen {
        piece_placement: placement(&board),
        active_color: Color::to_move_after(max_ply),
        castling: castling_rights(&board),
        en_passant: None,
        halfmove_clock: 0,
        fullmove_number: max_ply.div_ceil(2).max(1),
    }
}

fn resolve_board(snapshot: &BoardSnapshot) -> Board {
    let mut board: Board = [None; 64];
    for square in Square::all() {
        if let Some(observation) = snapshot.get(square) {
            board[square.index() as usize] = Some(observation.resolve());
        }
    }
    board
}

fn placement(board: &Board) -> String {
    let rows: Vec<String> = board
        .chunks(8)
        .map(|rank| {
            let mut row = String::new();
            let mut empty = 0u8;
            for cell in rank {
                match cell {
                    Some((color, piece)) => {
                        if empty > 0 {
                            row.push(char::from(b'0' + empty));
                            empty = 0;
                        }
                        row.push(piece.to_fen_char(*color));
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                row.push(char::from(b'0' + empty));
            }
            row
        })
        .collect();
    rows.join("/")
}

fn castling_rights(board: &Board) -> CastlingRights {
    let occupied_by = |file: File, color: Color, piece: Piece| {
        let square = Square::new(file, color.home_rank());
        board[square.index() as usize] == Some((color, piece))
    };
    let wing = |color: Color, rook_file: File| {
        occupied_by(File::E, color, Piece::King) && occupied_by(rook_file, color, Piece::Rook)
    };

    CastlingRights {
        white_kingside: wing(Color::White, File::H),
        white_queenside: wing(Color::White, File::A),
        black_kingside: wing(Color::Black, File::H),
        black_queenside: wing(Color::Black, File::A),
    }
}
