//! Engine wire format

use serde::{Deserialize, Serialize};

use crate::chess::{Color, PieceKind, Position};
use crate::protocol::MoveRequest;

/// One line on the engine connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineMessage {
    /// Sent once, first, to tell the engine which side it plays
    MatchStart { color: Color, max_time_ms: u64 },
    Move {
        from: Position,
        to: Position,
        #[serde(default)]
        promotion: Option<PieceKind>,
    },
}

impl EngineMessage {
    /// The move message for an accepted request; `None` if it leaves the board
    pub fn from_request(request: &MoveRequest) -> Option<Self> {
        Some(Self::Move {
            from: request.origin,
            to: request.destination()?,
            promotion: request.promotion,
        })
    }

    pub fn into_request(self) -> Option<MoveRequest> {
        match self {
            Self::Move {
                from,
                to,
                promotion,
            } => {
                let request = MoveRequest::between(from, to);
                Some(match promotion {
                    Some(kind) => request.with_promotion(kind),
                    None => request,
                })
            }
            Self::MatchStart { .. } => None,
        }
    }
}
