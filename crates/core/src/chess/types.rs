//! Value types shared by the board and the rules engine

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Side of a piece or a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Index for per-color arrays: White=0, Black=1
    pub fn index(self) -> usize {
        match self {
            Color::White => 0,
            Color::Black => 1,
        }
    }

    /// Rank delta of a pawn step
    pub fn forward(self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    pub fn home_rank(self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }

    pub fn pawn_rank(self) -> u8 {
        match self {
            Color::White => 1,
            Color::Black => 6,
        }
    }

    /// Rank on which this side's pawns promote
    pub fn last_rank(self) -> u8 {
        self.opponent().home_rank()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Black => write!(f, "black"),
            Color::White => write!(f, "white"),
        }
    }
}

/// A relative move: signed file and rank deltas from the piece's square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    pub file: i8,
    pub rank: i8,
}

impl Move {
    pub const fn new(file: i8, rank: i8) -> Self {
        Self { file, rank }
    }

    /// The offset that carries `from` onto `to`
    pub fn between(from: Position, to: Position) -> Self {
        Self {
            file: to.file as i8 - from.file as i8,
            rank: to.rank as i8 - from.rank as i8,
        }
    }

    pub fn scaled(self, steps: i8) -> Self {
        Self {
            file: self.file * steps,
            rank: self.rank * steps,
        }
    }
}

const ORTHOGONAL: [Move; 4] = [
    Move::new(1, 0),
    Move::new(-1, 0),
    Move::new(0, 1),
    Move::new(0, -1),
];

const DIAGONAL: [Move; 4] = [
    Move::new(1, 1),
    Move::new(1, -1),
    Move::new(-1, 1),
    Move::new(-1, -1),
];

const ROYAL: [Move; 8] = [
    Move::new(1, 0),
    Move::new(-1, 0),
    Move::new(0, 1),
    Move::new(0, -1),
    Move::new(1, 1),
    Move::new(1, -1),
    Move::new(-1, 1),
    Move::new(-1, -1),
];

const KNIGHT: [Move; 8] = [
    Move::new(1, 2),
    Move::new(2, 1),
    Move::new(2, -1),
    Move::new(1, -2),
    Move::new(-1, -2),
    Move::new(-2, -1),
    Move::new(-2, 1),
    Move::new(-1, 2),
];

const WHITE_PAWN: [Move; 1] = [Move::new(0, 1)];
const BLACK_PAWN: [Move; 1] = [Move::new(0, -1)];

const MAX_SLIDE: i8 = 7;

/// Kind of piece
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PieceKind {
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
    Pawn,
}

impl PieceKind {
    /// Unit directions this kind moves along. Pawn diagonals are not listed
    /// here; they are captures only and generated separately.
    pub fn base_moves(self, color: Color) -> &'static [Move] {
        match self {
            PieceKind::Rook => &ORTHOGONAL,
            PieceKind::Bishop => &DIAGONAL,
            PieceKind::Queen | PieceKind::King => &ROYAL,
            PieceKind::Knight => &KNIGHT,
            PieceKind::Pawn => match color {
                Color::White => &WHITE_PAWN,
                Color::Black => &BLACK_PAWN,
            },
        }
    }

    /// How many steps the piece may take along one base direction
    pub fn slide_limit(self, moves_made: u32) -> i8 {
        match self {
            PieceKind::Rook | PieceKind::Bishop | PieceKind::Queen => MAX_SLIDE,
            PieceKind::Knight | PieceKind::King => 1,
            PieceKind::Pawn if moves_made == 0 => 2,
            PieceKind::Pawn => 1,
        }
    }

    /// Whether the first occupied cell along a slide may be captured
    pub fn captures_by_sliding(self) -> bool {
        self != PieceKind::Pawn
    }

    pub fn is_minor(self) -> bool {
        matches!(self, PieceKind::Knight | PieceKind::Bishop)
    }

    pub fn is_promotion_target(self) -> bool {
        matches!(
            self,
            PieceKind::Knight | PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen
        )
    }

    /// FEN-style letter: uppercase for white, lowercase for black
    pub fn to_char(self, color: Color) -> char {
        let c = match self {
            PieceKind::Rook => 'r',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
            PieceKind::Pawn => 'p',
        };
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PieceKind::Rook => "rook",
            PieceKind::Knight => "knight",
            PieceKind::Bishop => "bishop",
            PieceKind::Queen => "queen",
            PieceKind::King => "king",
            PieceKind::Pawn => "pawn",
        };
        f.write_str(name)
    }
}

/// A square on the board, always in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Position {
    file: u8,
    rank: u8,
}

impl Position {
    /// # Panics
    /// When either coordinate is outside `0..8`. Every caller derives its
    /// coordinates from squares already on the board, so this is a bug.
    pub fn new(file: u8, rank: u8) -> Self {
        assert!(file < 8 && rank < 8, "square ({file}, {rank}) is off the board");
        Self { file, rank }
    }

    pub fn try_new(file: i16, rank: i16) -> Option<Self> {
        if (0..8).contains(&file) && (0..8).contains(&rank) {
            Some(Self {
                file: file as u8,
                rank: rank as u8,
            })
        } else {
            None
        }
    }

    pub fn file(self) -> u8 {
        self.file
    }

    pub fn rank(self) -> u8 {
        self.rank
    }

    /// The square reached by `mv`, if it is still on the board
    pub fn offset(self, mv: Move) -> Option<Self> {
        Self::try_new(
            self.file as i16 + mv.file as i16,
            self.rank as i16 + mv.rank as i16,
        )
    }

    pub(crate) fn index(self) -> usize {
        self.rank as usize * 8 + self.file as usize
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Coords {
            file: u8,
            rank: u8,
        }

        let coords = Coords::deserialize(deserializer)?;
        Position::try_new(coords.file as i16, coords.rank as i16).ok_or_else(|| {
            D::Error::custom(format!(
                "square ({}, {}) is off the board",
                coords.file, coords.rank
            ))
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file) as char, self.rank + 1)
    }
}

impl FromStr for Position {
    type Err = Error;

    /// Parses algebraic notation such as `e4`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 2 {
            return Err(Error::InvalidSquare(s.to_string()));
        }
        let file = bytes[0].to_ascii_lowercase().wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        Position::try_new(file as i16, rank as i16).ok_or_else(|| Error::InvalidSquare(s.to_string()))
    }
}

/// A piece standing on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub kind: PieceKind,
    pub color: Color,
    pub position: Position,
    /// Number of moves this piece has made
    pub moves: u32,
}

impl Piece {
    pub fn new(kind: PieceKind, color: Color, position: Position) -> Self {
        Self {
            kind,
            color,
            position,
            moves: 0,
        }
    }

    pub fn has_moved(&self) -> bool {
        self.moves > 0
    }
}

/// A set of squares stored as a 64-bit mask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SquareSet(u64);

impl SquareSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, position: Position) {
        self.0 |= 1u64 << position.index();
    }

    pub fn contains(&self, position: Position) -> bool {
        self.0 & (1u64 << position.index()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}
