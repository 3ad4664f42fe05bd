//! A single game of chess: board, turn, history and result

use serde::{Deserialize, Serialize};

use crate::chess::{self, Board, Color, LastMove, Move, PieceKind, Position, ScanMode};

/// Plies without a capture or pawn move after which the game is drawn
pub const MOVE_LIMIT_PLIES: u32 = 100;

/// Why a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    MoveLimit,
    Resignation,
    DrawAgreed,
    Timeout,
}

/// Final outcome of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub winner: Option<Color>,
    pub draw: bool,
    pub reason: Termination,
}

impl GameResult {
    pub fn win(winner: Color, reason: Termination) -> Self {
        Self {
            winner: Some(winner),
            draw: false,
            reason,
        }
    }

    pub fn draw(reason: Termination) -> Self {
        Self {
            winner: None,
            draw: true,
            reason,
        }
    }
}

/// One accepted move, in play order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub color: Color,
    pub piece: PieceKind,
    pub from: Position,
    pub to: Position,
    pub captured: Option<PieceKind>,
    pub promotion: Option<PieceKind>,
}

#[derive(Debug, Clone)]
pub struct Game {
    board: Board,
    turn: Color,
    result: Option<GameResult>,
    last: Option<LastMove>,
    quiet_plies: u32,
    history: Vec<MoveRecord>,
}

impl Game {
    /// A game from the starting position, white to move
    pub fn new() -> Self {
        Self::from_board(Board::new(), Color::White)
    }

    /// A game from an arbitrary position
    pub fn from_board(board: Board, turn: Color) -> Self {
        Self {
            board,
            turn,
            result: None,
            last: None,
            quiet_plies: 0,
            history: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn turn(&self) -> Color {
        self.turn
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn is_over(&self) -> bool {
        self.result.is_some()
    }

    pub fn last_move(&self) -> Option<&LastMove> {
        self.last.as_ref()
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    /// Plies since the last capture or pawn move
    pub fn quiet_plies(&self) -> u32 {
        self.quiet_plies
    }

    /// Legal moves of whatever piece stands on `origin`
    pub fn legal_moves(&self, origin: Position) -> Vec<Move> {
        match self.board.get(origin) {
            Some(piece) => chess::legal_moves(&self.board, piece, self.last.as_ref(), ScanMode::Legal),
            None => Vec::new(),
        }
    }

    pub fn is_in_check(&self) -> bool {
        chess::is_in_check(&self.board, self.turn, self.last.as_ref())
    }

    /// Whether the side to move may play `mv` from `origin`
    pub fn is_valid_move(&self, origin: Position, mv: Move, promotion: Option<PieceKind>) -> bool {
        if self.is_over() {
            return false;
        }
        let Some(piece) = self.board.get(origin) else {
            return false;
        };
        if piece.color != self.turn || !self.legal_moves(origin).contains(&mv) {
            return false;
        }

        let promotes = piece.kind == PieceKind::Pawn
            && origin
                .offset(mv)
                .is_some_and(|to| to.rank() == piece.color.last_rank());
        match promotion {
            Some(kind) if promotes => kind.is_promotion_target(),
            _ => true,
        }
    }

    /// Validates and plays a move for the side to move.
    ///
    /// Returns `false` and leaves the game untouched when the move is not
    /// legal. An accepted move may end the game; check `is_over` afterwards.
    pub fn make_move(&mut self, origin: Position, mv: Move, promotion: Option<PieceKind>) -> bool {
        if !self.is_valid_move(origin, mv, promotion) {
            return false;
        }
        let Some(&piece) = self.board.get(origin) else {
            return false;
        };
        let Some(destination) = origin.offset(mv) else {
            return false;
        };

        let promotion = if piece.kind == PieceKind::Pawn && destination.rank() == piece.color.last_rank() {
            Some(promotion.unwrap_or(PieceKind::Queen))
        } else {
            None
        };
        let captured = self.board.apply(origin, mv, promotion);

        if captured.is_some() || piece.kind == PieceKind::Pawn {
            self.quiet_plies = 0;
        } else {
            self.quiet_plies += 1;
        }

        self.history.push(MoveRecord {
            color: piece.color,
            piece: piece.kind,
            from: origin,
            to: destination,
            captured: captured.map(|p| p.kind),
            promotion,
        });
        if let Some(&moved) = self.board.get(destination) {
            self.last = Some(LastMove { piece: moved, mv });
        }
        self.turn = self.turn.opponent();
        self.evaluate();

        true
    }

    /// Records `result` unless the game already has one, and returns
    /// whichever result stands.
    pub fn conclude(&mut self, result: GameResult) -> GameResult {
        *self.result.get_or_insert(result)
    }

    fn evaluate(&mut self) {
        let side = self.turn;
        let last = self.last.as_ref();

        let result = if !chess::has_legal_move(&self.board, side, last) {
            if chess::is_in_check(&self.board, side, last) {
                GameResult::win(side.opponent(), Termination::Checkmate)
            } else {
                GameResult::draw(Termination::Stalemate)
            }
        } else if chess::insufficient_material(&self.board) {
            GameResult::draw(Termination::InsufficientMaterial)
        } else if self.quiet_plies >= MOVE_LIMIT_PLIES {
            GameResult::draw(Termination::MoveLimit)
        } else {
            return;
        };

        self.conclude(result);
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(name: &str) -> Position {
        name.parse().unwrap()
    }

    fn play(game: &mut Game, from: &str, to: &str) -> bool {
        game.make_move(sq(from), Move::between(sq(from), sq(to)), None)
    }

    #[test]
    fn test_fools_mate() {
        let mut game = Game::new();
        assert!(play(&mut game, "f2", "f3"));
        assert!(play(&mut game, "e7", "e5"));
        assert!(play(&mut game, "g2", "g4"));
        assert!(!game.is_over());
        assert!(play(&mut game, "d8", "h4"));

        assert!(game.is_over());
        let result = game.result().unwrap();
        assert_eq!(result.winner, Some(Color::Black));
        assert!(!result.draw);
        assert_eq!(result.reason, Termination::Checkmate);
        assert!(chess::all_legal_moves(game.board(), Color::White, game.last_move()).is_empty());

        assert!(!play(&mut game, "a2", "a3"));
        assert_eq!(game.history().len(), 4);
    }

    #[test]
    fn test_rejects_wrong_turn_and_illegal_moves() {
        let mut game = Game::new();
        assert!(!play(&mut game, "e7", "e5"));
        assert!(!play(&mut game, "e2", "e5"));
        assert!(!play(&mut game, "e4", "e5"));
        assert!(!play(&mut game, "a1", "a3"));
        assert_eq!(game.turn(), Color::White);
        assert!(play(&mut game, "g1", "f3"));
        assert_eq!(game.turn(), Color::Black);
    }

    #[test]
    fn test_stalemate_is_a_draw() {
        let mut board = Board::empty();
        board.place(PieceKind::King, Color::Black, sq("h8"));
        board.place(PieceKind::King, Color::White, sq("f7"));
        board.place(PieceKind::Queen, Color::White, sq("g5"));
        let mut game = Game::from_board(board, Color::White);

        assert!(play(&mut game, "g5", "g6"));
        let result = game.result().unwrap();
        assert!(result.draw);
        assert_eq!(result.winner, None);
        assert_eq!(result.reason, Termination::Stalemate);
    }

    #[test]
    fn test_bare_kings_draw() {
        let mut board = Board::empty();
        board.place(PieceKind::King, Color::White, sq("h1"));
        board.place(PieceKind::Rook, Color::White, sq("d2"));
        board.place(PieceKind::King, Color::Black, sq("e3"));
        let mut game = Game::from_board(board, Color::Black);

        assert!(play(&mut game, "e3", "d2"));
        let result = game.result().unwrap();
        assert!(result.draw);
        assert_eq!(result.reason, Termination::InsufficientMaterial);
    }

    #[test]
    fn test_move_limit_draw() {
        let mut game = Game::new();
        let shuffle = [("b1", "c3"), ("g8", "f6"), ("c3", "b1"), ("f6", "g8")];
        for ply in 0..MOVE_LIMIT_PLIES as usize {
            assert!(!game.is_over(), "ended early at ply {ply}");
            let (from, to) = shuffle[ply % shuffle.len()];
            assert!(play(&mut game, from, to));
        }
        let result = game.result().unwrap();
        assert!(result.draw);
        assert_eq!(result.reason, Termination::MoveLimit);
    }

    #[test]
    fn test_pawn_move_resets_quiet_plies() {
        let mut game = Game::new();
        assert!(play(&mut game, "g1", "f3"));
        assert!(play(&mut game, "g8", "f6"));
        assert_eq!(game.quiet_plies(), 2);
        assert!(play(&mut game, "e2", "e4"));
        assert_eq!(game.quiet_plies(), 0);
    }

    #[test]
    fn test_promotion() {
        let mut board = Board::empty();
        board.place(PieceKind::King, Color::White, sq("a1"));
        board.place(PieceKind::King, Color::Black, sq("h8"));
        board.place(PieceKind::Pawn, Color::White, sq("c7"));
        board.place(PieceKind::Rook, Color::Black, sq("h2"));
        let mut game = Game::from_board(board, Color::White);

        let push = Move::new(0, 1);
        assert!(!game.make_move(sq("c7"), push, Some(PieceKind::King)));
        assert!(game.make_move(sq("c7"), push, Some(PieceKind::Knight)));
        assert_eq!(game.board().get(sq("c8")).unwrap().kind, PieceKind::Knight);
        assert_eq!(game.history()[0].promotion, Some(PieceKind::Knight));
    }

    #[test]
    fn test_conclude_keeps_first_result() {
        let mut game = Game::new();
        let first = game.conclude(GameResult::win(Color::White, Termination::Timeout));
        let second = game.conclude(GameResult::draw(Termination::DrawAgreed));
        assert_eq!(first, second);
        assert_eq!(game.result().unwrap().reason, Termination::Timeout);
        assert!(!play(&mut game, "e2", "e4"));
    }
}
