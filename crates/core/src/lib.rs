//! Chess Match Core Library

pub mod chess;
pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod matching;
pub mod player;
pub mod protocol;
pub mod session;

pub use chess::{Board, Color, Move, PieceKind, Position};
pub use config::Config;
pub use engine::EngineClient;
pub use error::{Error, Result};
pub use game::{Game, GameResult, MoveRecord, Termination};
pub use matching::{Match, MatchRegistry, MatchSettings, MatchingPool};
pub use player::Player;
pub use protocol::{AsyncRequest, AsyncResponse, MatchStart, MoveRequest, MoveResponse};
pub use session::SessionStore;
