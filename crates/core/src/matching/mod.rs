//! Pairing players and running their matches

mod game_match;
mod pool;
mod registry;

use std::time::Duration;

pub use crate::player::MatchId;
pub use game_match::Match;
pub use pool::{MatchingPool, ENGINE_NAME};
pub use registry::{MatchRegistry, MatchSummary};

/// Per-match timing and seating policy
#[derive(Debug, Clone)]
pub struct MatchSettings {
    /// Total clock time each player gets for the whole game
    pub max_time: Duration,
    /// Upper bound on handing one message to one player
    pub delivery_timeout: Duration,
    /// How long a finished match waits for its clients to collect the result
    pub client_done_timeout: Duration,
    /// Assign colors by coin flip; otherwise the first dequeued player is white
    pub random_colors: bool,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            max_time: Duration::from_secs(600),
            delivery_timeout: Duration::from_secs(5),
            client_done_timeout: Duration::from_secs(30),
            random_colors: true,
        }
    }
}
