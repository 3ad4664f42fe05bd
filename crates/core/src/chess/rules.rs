//! Legal move generation and terminal-state detection
//!
//! Everything here is a pure function of the board and the previous move.
//! Check safety is decided by simulating each candidate on a copy of the
//! board rather than from a pin table.

use super::board::Board;
use super::types::{Color, Move, Piece, PieceKind, Position, SquareSet};

/// Which question `legal_moves` answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Moves the piece may actually play: includes castling, filters out
    /// anything that leaves its own king attacked.
    Legal,
    /// Squares the piece attacks: no castling, no check filtering, pawns
    /// count both diagonals (occupied or not) and never their forward step.
    Threat,
}

/// The previous move and the piece that made it, as it stands afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastMove {
    pub piece: Piece,
    pub mv: Move,
}

/// Moves available to `piece` on `board`, relative to its position
pub fn legal_moves(board: &Board, piece: &Piece, last: Option<&LastMove>, mode: ScanMode) -> Vec<Move> {
    let mut moves = Vec::new();

    if piece.kind != PieceKind::Pawn || mode == ScanMode::Legal {
        slide_moves(board, piece, &mut moves);
    }
    if piece.kind == PieceKind::Pawn {
        pawn_captures(board, piece, last, mode, &mut moves);
    }

    if mode == ScanMode::Legal {
        if piece.kind == PieceKind::King {
            castling_moves(board, piece, last, &mut moves);
        }
        moves.retain(|mv| keeps_king_safe(board, piece, *mv));
    }

    moves
}

/// Every square `by` attacks
pub fn threatened_squares(board: &Board, by: Color, last: Option<&LastMove>) -> SquareSet {
    let mut threatened = SquareSet::new();
    for piece in board.pieces_of(by) {
        for mv in legal_moves(board, piece, last, ScanMode::Threat) {
            if let Some(target) = piece.position.offset(mv) {
                threatened.insert(target);
            }
        }
    }
    threatened
}

pub fn is_in_check(board: &Board, color: Color, last: Option<&LastMove>) -> bool {
    match board.king(color) {
        Some(king) => threatened_squares(board, color.opponent(), last).contains(king.position),
        None => false,
    }
}

/// All legal moves for one side, keyed by origin square
pub fn all_legal_moves(board: &Board, color: Color, last: Option<&LastMove>) -> Vec<(Position, Move)> {
    board
        .pieces_of(color)
        .flat_map(|piece| {
            legal_moves(board, piece, last, ScanMode::Legal)
                .into_iter()
                .map(move |mv| (piece.position, mv))
        })
        .collect()
}

pub fn has_legal_move(board: &Board, color: Color, last: Option<&LastMove>) -> bool {
    board
        .pieces_of(color)
        .any(|piece| !legal_moves(board, piece, last, ScanMode::Legal).is_empty())
}

/// Neither side can force mate: each has at most a king and one minor piece
pub fn insufficient_material(board: &Board) -> bool {
    Color::ALL.iter().all(|&color| {
        let mut minors = 0;
        for piece in board.pieces_of(color) {
            match piece.kind {
                PieceKind::King => {}
                kind if kind.is_minor() => minors += 1,
                _ => return false,
            }
        }
        minors <= 1
    })
}

fn slide_moves(board: &Board, piece: &Piece, out: &mut Vec<Move>) {
    let limit = piece.kind.slide_limit(piece.moves);
    for &direction in piece.kind.base_moves(piece.color) {
        for step in 1..=limit {
            let mv = direction.scaled(step);
            let Some(target) = piece.position.offset(mv) else {
                break;
            };
            match board.get(target) {
                None => out.push(mv),
                Some(other) => {
                    if other.color != piece.color && piece.kind.captures_by_sliding() {
                        out.push(mv);
                    }
                    break;
                }
            }
        }
    }
}

fn pawn_captures(board: &Board, pawn: &Piece, last: Option<&LastMove>, mode: ScanMode, out: &mut Vec<Move>) {
    for file in [-1, 1] {
        let mv = Move::new(file, pawn.color.forward());
        let Some(target) = pawn.position.offset(mv) else {
            continue;
        };
        let allowed = match mode {
            ScanMode::Threat => true,
            ScanMode::Legal => match board.get(target) {
                Some(other) => other.color != pawn.color,
                None => is_en_passant(board, pawn, target, last),
            },
        };
        if allowed {
            out.push(mv);
        }
    }
}

/// The pawn behind `target` must be the enemy pawn that just advanced two ranks
fn is_en_passant(board: &Board, pawn: &Piece, target: Position, last: Option<&LastMove>) -> bool {
    let Some(last) = last else {
        return false;
    };
    let shadow = Position::new(target.file(), pawn.position.rank());
    let Some(victim) = board.get(shadow) else {
        return false;
    };

    victim.kind == PieceKind::Pawn
        && victim.color != pawn.color
        && last.piece.kind == PieceKind::Pawn
        && last.piece.position == shadow
        && last.mv.rank.abs() == 2
}

fn castling_moves(board: &Board, king: &Piece, last: Option<&LastMove>, out: &mut Vec<Move>) {
    if king.has_moved() {
        return;
    }
    let threatened = threatened_squares(board, king.color.opponent(), last);
    if threatened.contains(king.position) {
        return;
    }

    let rank = king.position.rank();
    for (rook_file, direction) in [(7u8, 1i8), (0u8, -1i8)] {
        let Some(rook) = board.get(Position::new(rook_file, rank)) else {
            continue;
        };
        if rook.kind != PieceKind::Rook || rook.color != king.color || rook.has_moved() {
            continue;
        }

        let king_file = king.position.file();
        let (low, high) = if rook_file > king_file {
            (king_file + 1, rook_file)
        } else {
            (rook_file + 1, king_file)
        };
        if (low..high).any(|file| board.is_occupied(Position::new(file, rank))) {
            continue;
        }

        let path = king.position.offset(Move::new(direction, 0));
        let destination = king.position.offset(Move::new(2 * direction, 0));
        if let (Some(path), Some(destination)) = (path, destination) {
            if !threatened.contains(path) && !threatened.contains(destination) {
                out.push(Move::new(2 * direction, 0));
            }
        }
    }
}

fn keeps_king_safe(board: &Board, piece: &Piece, mv: Move) -> bool {
    let mut next = board.clone();
    next.apply(piece.position, mv, None);
    !is_in_check(&next, piece.color, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Position {
        name.parse().unwrap()
    }

    fn moves_from(board: &Board, at: &str, last: Option<&LastMove>) -> Vec<Move> {
        let piece = board.get(sq(at)).unwrap();
        legal_moves(board, piece, last, ScanMode::Legal)
    }

    /// Plays `from -> to` on `board` and returns the move record for en passant
    fn play(board: &mut Board, from: &str, to: &str) -> LastMove {
        let mv = Move::between(sq(from), sq(to));
        board.apply(sq(from), mv, None);
        LastMove {
            piece: *board.get(sq(to)).unwrap(),
            mv,
        }
    }

    #[test]
    fn test_starting_position_has_twenty_moves() {
        let board = Board::new();
        assert_eq!(all_legal_moves(&board, Color::White, None).len(), 20);
        assert_eq!(all_legal_moves(&board, Color::Black, None).len(), 20);
    }

    #[test]
    fn test_unmoved_pawn_has_two_forward_moves() {
        let mut board = Board::new();
        let moves = moves_from(&board, "e2", None);
        assert_eq!(moves.len(), 2);
        assert!(moves.contains(&Move::new(0, 1)));
        assert!(moves.contains(&Move::new(0, 2)));

        play(&mut board, "e2", "e3");
        assert_eq!(moves_from(&board, "e3", None), vec![Move::new(0, 1)]);
    }

    #[test]
    fn test_pawn_cannot_capture_forward() {
        let mut board = Board::empty();
        board.place(PieceKind::Pawn, Color::White, sq("d4"));
        board.place(PieceKind::Pawn, Color::Black, sq("d5"));
        assert!(moves_from(&board, "d4", None).is_empty());

        board.place(PieceKind::Knight, Color::Black, sq("e5"));
        assert_eq!(moves_from(&board, "d4", None), vec![Move::new(1, 1)]);
    }

    #[test]
    fn test_threat_scan_counts_pawn_diagonals_only() {
        let mut board = Board::empty();
        board.place(PieceKind::Pawn, Color::White, sq("b2"));
        let threatened = threatened_squares(&board, Color::White, None);
        assert_eq!(threatened.len(), 2);
        assert!(threatened.contains(sq("a3")));
        assert!(threatened.contains(sq("c3")));
        assert!(!threatened.contains(sq("b3")));
    }

    #[test]
    fn test_en_passant_after_double_step() {
        let mut board = Board::new();
        play(&mut board, "e2", "e4");
        play(&mut board, "a7", "a6");
        play(&mut board, "e4", "e5");
        let last = play(&mut board, "d7", "d5");

        let moves = moves_from(&board, "e5", Some(&last));
        let diagonals: Vec<_> = moves.iter().filter(|mv| mv.file != 0).collect();
        assert_eq!(diagonals, vec![&Move::new(-1, 1)]);

        board.apply(sq("e5"), Move::new(-1, 1), None);
        assert!(board.get(sq("d5")).is_none());
        assert_eq!(board.get(sq("d6")).unwrap().color, Color::White);
    }

    #[test]
    fn test_en_passant_expires_after_another_move() {
        let mut board = Board::new();
        play(&mut board, "e2", "e4");
        play(&mut board, "a7", "a6");
        play(&mut board, "e4", "e5");
        play(&mut board, "d7", "d5");
        play(&mut board, "h2", "h3");
        let last = play(&mut board, "a6", "a5");

        let moves = moves_from(&board, "e5", Some(&last));
        assert!(moves.iter().all(|mv| mv.file == 0));
    }

    #[test]
    fn test_en_passant_requires_double_step() {
        let mut board = Board::empty();
        board.place(PieceKind::Pawn, Color::White, sq("e5"));
        board.place(PieceKind::Pawn, Color::Black, sq("d6"));
        let last = play(&mut board, "d6", "d5");
        let moves = moves_from(&board, "e5", Some(&last));
        assert!(!moves.is_empty());
        assert!(moves.iter().all(|mv| mv.file == 0));
    }

    fn castling_board() -> Board {
        let mut board = Board::empty();
        board.place(PieceKind::King, Color::White, sq("e1"));
        board.place(PieceKind::Rook, Color::White, sq("a1"));
        board.place(PieceKind::Rook, Color::White, sq("h1"));
        board.place(PieceKind::King, Color::Black, sq("e8"));
        board
    }

    #[test]
    fn test_castling_both_sides() {
        let board = castling_board();
        let moves = moves_from(&board, "e1", None);
        assert!(moves.contains(&Move::new(2, 0)));
        assert!(moves.contains(&Move::new(-2, 0)));
    }

    #[test]
    fn test_castling_blocked_by_piece() {
        let mut board = castling_board();
        board.place(PieceKind::Knight, Color::White, sq("b1"));
        let moves = moves_from(&board, "e1", None);
        assert!(moves.contains(&Move::new(2, 0)));
        assert!(!moves.contains(&Move::new(-2, 0)));
    }

    #[test]
    fn test_castling_requires_unmoved_pieces() {
        let mut board = castling_board();
        play(&mut board, "h1", "h2");
        play(&mut board, "h2", "h1");
        let moves = moves_from(&board, "e1", None);
        assert!(!moves.contains(&Move::new(2, 0)));
        assert!(moves.contains(&Move::new(-2, 0)));

        play(&mut board, "e1", "e2");
        play(&mut board, "e2", "e1");
        let moves = moves_from(&board, "e1", None);
        assert!(!moves.contains(&Move::new(-2, 0)));
    }

    #[test]
    fn test_castling_through_threatened_square() {
        let mut board = castling_board();
        // rook on f8 covers f1, the kingside path square
        board.place(PieceKind::Rook, Color::Black, sq("f8"));
        let moves = moves_from(&board, "e1", None);
        assert!(!moves.contains(&Move::new(2, 0)));
        assert!(moves.contains(&Move::new(-2, 0)));
    }

    #[test]
    fn test_castling_out_of_check() {
        let mut board = castling_board();
        board.place(PieceKind::Rook, Color::Black, sq("e5"));
        let moves = moves_from(&board, "e1", None);
        assert!(!moves.iter().any(|mv| mv.file.abs() == 2));
    }

    #[test]
    fn test_queenside_b_file_may_be_attacked() {
        let mut board = castling_board();
        board.place(PieceKind::Rook, Color::Black, sq("b8"));
        let moves = moves_from(&board, "e1", None);
        assert!(moves.contains(&Move::new(-2, 0)));
    }

    #[test]
    fn test_king_never_steps_into_check() {
        let mut board = Board::empty();
        board.place(PieceKind::King, Color::White, sq("e1"));
        board.place(PieceKind::Rook, Color::Black, sq("d8"));
        board.place(PieceKind::King, Color::Black, sq("h8"));
        let moves = moves_from(&board, "e1", None);
        assert!(moves.iter().all(|mv| mv.file != -1));
        assert_eq!(moves.len(), 3);
    }

    #[test]
    fn test_king_cannot_capture_defended_piece() {
        let mut board = Board::empty();
        board.place(PieceKind::King, Color::White, sq("e1"));
        board.place(PieceKind::Pawn, Color::Black, sq("e2"));
        board.place(PieceKind::Pawn, Color::Black, sq("d3"));
        board.place(PieceKind::King, Color::Black, sq("h8"));
        let moves = moves_from(&board, "e1", None);
        assert!(!moves.contains(&Move::new(0, 1)));
    }

    #[test]
    fn test_pinned_piece_stays_on_the_line() {
        let mut board = Board::empty();
        board.place(PieceKind::King, Color::White, sq("e1"));
        board.place(PieceKind::Rook, Color::White, sq("e2"));
        board.place(PieceKind::Queen, Color::Black, sq("e7"));
        board.place(PieceKind::King, Color::Black, sq("a8"));
        let moves = moves_from(&board, "e2", None);
        assert!(moves.iter().all(|mv| mv.file == 0));
        assert_eq!(moves.len(), 5);
    }

    #[test]
    fn test_sliding_stops_at_first_piece() {
        let mut board = Board::empty();
        board.place(PieceKind::Rook, Color::White, sq("a1"));
        board.place(PieceKind::Pawn, Color::White, sq("a3"));
        board.place(PieceKind::Pawn, Color::Black, sq("c1"));
        let moves = moves_from(&board, "a1", None);
        assert_eq!(moves.len(), 3);
        assert!(moves.contains(&Move::new(0, 1)));
        assert!(moves.contains(&Move::new(1, 0)));
        assert!(moves.contains(&Move::new(2, 0)));
    }

    #[test]
    fn test_insufficient_material() {
        let mut board = Board::empty();
        board.place(PieceKind::King, Color::White, sq("e1"));
        board.place(PieceKind::King, Color::Black, sq("e8"));
        assert!(insufficient_material(&board));

        board.place(PieceKind::Bishop, Color::White, sq("c1"));
        board.place(PieceKind::Knight, Color::Black, sq("b8"));
        assert!(insufficient_material(&board));

        board.place(PieceKind::Knight, Color::White, sq("g1"));
        assert!(!insufficient_material(&board));

        assert!(!insufficient_material(&Board::new()));
    }
}
