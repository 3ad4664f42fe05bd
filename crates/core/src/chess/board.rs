//! The 8x8 board and move application

use std::fmt;

use super::types::{Color, Move, Piece, PieceKind, Position};

const BACK_RANK: [PieceKind; 8] = [
    PieceKind::Rook,
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Queen,
    PieceKind::King,
    PieceKind::Bishop,
    PieceKind::Knight,
    PieceKind::Rook,
];

/// An 8x8 grid holding at most one piece per cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<Piece>; 8]; 8],
}

impl Board {
    /// Standard starting arrangement, white on ranks 0 and 1
    pub fn new() -> Self {
        let mut board = Self::empty();
        for color in Color::ALL {
            for (file, kind) in BACK_RANK.iter().enumerate() {
                board.place(*kind, color, Position::new(file as u8, color.home_rank()));
                board.place(PieceKind::Pawn, color, Position::new(file as u8, color.pawn_rank()));
            }
        }
        board
    }

    pub fn empty() -> Self {
        Self {
            cells: [[None; 8]; 8],
        }
    }

    /// Puts an unmoved piece on `at`, replacing whatever stood there
    pub fn place(&mut self, kind: PieceKind, color: Color, at: Position) -> &mut Self {
        self.set(Piece::new(kind, color, at));
        self
    }

    pub fn get(&self, at: Position) -> Option<&Piece> {
        self.cells[at.rank() as usize][at.file() as usize].as_ref()
    }

    pub fn is_occupied(&self, at: Position) -> bool {
        self.get(at).is_some()
    }

    pub fn remove(&mut self, at: Position) -> Option<Piece> {
        self.cells[at.rank() as usize][at.file() as usize].take()
    }

    /// Stores `piece` on the cell named by its own position
    pub fn set(&mut self, piece: Piece) {
        self.cells[piece.position.rank() as usize][piece.position.file() as usize] = Some(piece);
    }

    pub fn pieces(&self) -> impl Iterator<Item = &Piece> + '_ {
        self.cells.iter().flatten().flatten()
    }

    pub fn pieces_of(&self, color: Color) -> impl Iterator<Item = &Piece> + '_ {
        self.pieces().filter(move |p| p.color == color)
    }

    pub fn king(&self, color: Color) -> Option<&Piece> {
        self.pieces_of(color).find(|p| p.kind == PieceKind::King)
    }

    /// Applies an already validated move and returns the captured piece.
    ///
    /// Handles the side effects of the special moves: an en-passant capture
    /// removes the pawn behind the destination, castling brings the rook
    /// across the king, and a pawn reaching its last rank becomes
    /// `promotion` (a queen when none is given).
    ///
    /// # Panics
    /// When `origin` is empty or `mv` leaves the board. Moves are checked
    /// against the legal set before they get here, so either case is a bug.
    pub fn apply(&mut self, origin: Position, mv: Move, promotion: Option<PieceKind>) -> Option<Piece> {
        let Some(mut piece) = self.remove(origin) else {
            panic!("no piece on {origin} to apply {mv:?}");
        };
        let Some(destination) = origin.offset(mv) else {
            panic!("{mv:?} from {origin} leaves the board");
        };

        let mut captured = self.remove(destination);
        if piece.kind == PieceKind::Pawn && mv.file != 0 && captured.is_none() {
            captured = self.remove(Position::new(destination.file(), origin.rank()));
        }

        if piece.kind == PieceKind::King && mv.file.abs() == 2 {
            let (rook_file, rook_step) = if mv.file > 0 { (7, -1) } else { (0, 1) };
            if let Some(mut rook) = self.remove(Position::new(rook_file, origin.rank())) {
                rook.position = destination
                    .offset(Move::new(rook_step, 0))
                    .unwrap_or(rook.position);
                rook.moves += 1;
                self.set(rook);
            }
        }

        piece.position = destination;
        piece.moves += 1;
        if piece.kind == PieceKind::Pawn && destination.rank() == piece.color.last_rank() {
            piece.kind = promotion.unwrap_or(PieceKind::Queen);
        }
        self.set(piece);

        captured
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for rank in (0..8u8).rev() {
            for file in 0..8u8 {
                let c = self
                    .get(Position::new(file, rank))
                    .map(|p| p.kind.to_char(p.color))
                    .unwrap_or('.');
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Position {
        name.parse().unwrap()
    }

    #[test]
    fn test_starting_board() {
        let board = Board::new();
        assert_eq!(board.pieces().count(), 32);

        let pawns: Vec<_> = board.pieces().filter(|p| p.kind == PieceKind::Pawn).collect();
        assert_eq!(pawns.len(), 16);
        for color in Color::ALL {
            let ranks: Vec<_> = pawns
                .iter()
                .filter(|p| p.color == color)
                .map(|p| p.position.rank())
                .collect();
            assert_eq!(ranks.len(), 8);
            assert!(ranks.iter().all(|r| *r == color.pawn_rank()));
        }
        assert_eq!(Color::White.pawn_rank(), 1);
        assert_eq!(Color::Black.pawn_rank(), 6);

        // back ranks mirror each other file by file
        for file in 0..8 {
            let white = board.get(Position::new(file, 0)).unwrap();
            let black = board.get(Position::new(file, 7)).unwrap();
            assert_eq!(white.kind, black.kind);
            assert_eq!(white.color, Color::White);
            assert_eq!(black.color, Color::Black);
        }
        assert_eq!(board.king(Color::White).unwrap().position, sq("e1"));
        assert_eq!(board.king(Color::Black).unwrap().position, sq("e8"));
    }

    #[test]
    fn test_capture_round_trip_under_manual_undo() {
        let mut board = Board::empty();
        board.place(PieceKind::Rook, Color::White, sq("a1"));
        board.place(PieceKind::Knight, Color::Black, sq("a5"));
        let before = board.clone();

        let mover = *board.get(sq("a1")).unwrap();
        let captured = board.apply(sq("a1"), Move::new(0, 4), None).unwrap();
        assert_eq!(captured.kind, PieceKind::Knight);
        assert_eq!(board.get(sq("a5")).unwrap().moves, 1);

        board.remove(sq("a5"));
        board.set(mover);
        board.set(captured);
        assert_eq!(board, before);
    }

    #[test]
    fn test_apply_castles_rook_across_king() {
        let mut board = Board::empty();
        board.place(PieceKind::King, Color::White, sq("e1"));
        board.place(PieceKind::Rook, Color::White, sq("a1"));
        board.apply(sq("e1"), Move::new(-2, 0), None);
        assert_eq!(board.get(sq("c1")).unwrap().kind, PieceKind::King);
        assert_eq!(board.get(sq("d1")).unwrap().kind, PieceKind::Rook);
        assert!(board.get(sq("a1")).is_none());
    }

    #[test]
    fn test_apply_promotes_on_last_rank() {
        let mut board = Board::empty();
        board.place(PieceKind::Pawn, Color::Black, sq("c2"));
        board.apply(sq("c2"), Move::new(0, -1), Some(PieceKind::Knight));
        assert_eq!(board.get(sq("c1")).unwrap().kind, PieceKind::Knight);
    }

    #[test]
    #[should_panic]
    fn test_apply_from_empty_square_panics() {
        Board::empty().apply(sq("d4"), Move::new(0, 1), None);
    }
}
