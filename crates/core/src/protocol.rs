//! Messages exchanged between a player's client and its match

use serde::{Deserialize, Serialize};

use crate::chess::{Color, Move, PieceKind, Position};
use crate::game::{GameResult, Termination};

/// A move submission: the origin square and a relative move from it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub origin: Position,
    pub mv: Move,
    #[serde(default)]
    pub promotion: Option<PieceKind>,
}

impl MoveRequest {
    pub fn new(origin: Position, mv: Move) -> Self {
        Self {
            origin,
            mv,
            promotion: None,
        }
    }

    /// A request moving the piece on `from` to `to`
    pub fn between(from: Position, to: Position) -> Self {
        Self::new(from, Move::between(from, to))
    }

    pub fn with_promotion(mut self, kind: PieceKind) -> Self {
        self.promotion = Some(kind);
        self
    }

    /// Destination square, if the move stays on the board
    pub fn destination(&self) -> Option<Position> {
        self.origin.offset(self.mv)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResponse {
    pub success: bool,
}

impl MoveResponse {
    pub fn accepted() -> Self {
        Self { success: true }
    }

    pub fn rejected() -> Self {
        Self { success: false }
    }
}

/// Out-of-turn request: resign or toggle a draw offer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncRequest {
    #[serde(default)]
    pub resign: bool,
    #[serde(default)]
    pub request_to_draw: bool,
}

impl AsyncRequest {
    pub fn resignation() -> Self {
        Self {
            resign: true,
            request_to_draw: false,
        }
    }

    pub fn draw_offer() -> Self {
        Self {
            resign: false,
            request_to_draw: true,
        }
    }
}

/// Pushed to a player on draw-offer changes and once when the game ends.
///
/// `winner` holds the winner's display name, empty for draws and while the
/// game is still running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncResponse {
    pub game_over: bool,
    pub request_to_draw: bool,
    pub draw: bool,
    pub resignation: bool,
    pub timeout: bool,
    pub winner: String,
}

impl AsyncResponse {
    /// The opponent opened (`true`) or withdrew (`false`) a draw offer
    pub fn draw_offer(open: bool) -> Self {
        Self {
            request_to_draw: open,
            ..Self::default()
        }
    }

    pub fn game_over(result: &GameResult, winner: String) -> Self {
        Self {
            game_over: true,
            request_to_draw: false,
            draw: result.draw,
            resignation: result.reason == Termination::Resignation,
            timeout: result.reason == Termination::Timeout,
            winner,
        }
    }
}

/// Sent to each player when its match begins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStart {
    pub color: Color,
    pub opponent: String,
    pub max_time_ms: u64,
}
