//! Live-match registry

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use super::{Match, MatchId};
use crate::chess::Color;

struct LiveMatch {
    handle: Weak<Match>,
    white: String,
    black: String,
    started: Instant,
}

/// Snapshot of one live match
#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub id: MatchId,
    pub white: String,
    pub black: String,
    pub plies: usize,
    pub running_secs: u64,
}

/// Matches currently being played, keyed by id.
///
/// Holds weak handles only; the pool worker running a match owns it.
#[derive(Default)]
pub struct MatchRegistry {
    matches: RwLock<HashMap<MatchId, LiveMatch>>,
}

impl MatchRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, game_match: &Arc<Match>) {
        let entry = LiveMatch {
            handle: Arc::downgrade(game_match),
            white: game_match.name(Color::White).to_string(),
            black: game_match.name(Color::Black).to_string(),
            started: Instant::now(),
        };
        self.matches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(game_match.id(), entry);
    }

    pub fn remove(&self, id: MatchId) -> bool {
        self.matches
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    pub fn contains(&self, id: MatchId) -> bool {
        self.matches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&id)
    }

    pub fn get(&self, id: MatchId) -> Option<Arc<Match>> {
        self.matches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .and_then(|entry| entry.handle.upgrade())
    }

    pub fn len(&self) -> usize {
        self.matches.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summaries(&self) -> Vec<MatchSummary> {
        let matches = self.matches.read().unwrap_or_else(PoisonError::into_inner);
        let mut summaries: Vec<_> = matches
            .iter()
            .filter_map(|(id, entry)| {
                let game_match = entry.handle.upgrade()?;
                Some(MatchSummary {
                    id: *id,
                    white: entry.white.clone(),
                    black: entry.black.clone(),
                    plies: game_match.history().len(),
                    running_secs: entry.started.elapsed().as_secs(),
                })
            })
            .collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    /// Drops entries whose match has already been released
    pub fn sweep(&self) -> usize {
        let mut matches = self.matches.write().unwrap_or_else(PoisonError::into_inner);
        let before = matches.len();
        matches.retain(|_, entry| entry.handle.strong_count() > 0);
        before - matches.len()
    }

    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    debug!(removed, "swept stale matches");
                }
            }
        })
    }
}
