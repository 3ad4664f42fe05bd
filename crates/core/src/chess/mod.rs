//! Chess rules: board model, legal moves, terminal detection

mod board;
mod rules;
mod types;

pub use board::Board;
pub use rules::{
    all_legal_moves, has_legal_move, insufficient_material, is_in_check, legal_moves,
    threatened_squares, LastMove, ScanMode,
};
pub use types::{Color, Move, Piece, PieceKind, Position, SquareSet};
