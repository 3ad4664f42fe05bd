//! Login sessions: opaque tokens mapped to player handles

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::player::Player;

struct Session {
    player: Arc<Player>,
    expires_at: Instant,
}

/// Token-keyed player store with a sliding TTL
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Stores `player` under a fresh random token and returns the token
    pub fn create(&self, player: Arc<Player>) -> String {
        let token = format!("{:032x}", rand::random::<u128>());
        debug!(player = player.name(), "session created");
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                token.clone(),
                Session {
                    player,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        token
    }

    /// Looks up a live session and extends it
    pub fn get(&self, token: &str) -> Option<Arc<Player>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let session = sessions.get_mut(token)?;
        let now = Instant::now();
        if session.expires_at <= now {
            sessions.remove(token);
            return None;
        }
        session.expires_at = now + self.ttl;
        Some(Arc::clone(&session.player))
    }

    pub fn remove(&self, token: &str) -> Option<Arc<Player>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
            .map(|session| session.player)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops expired sessions and returns how many went
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        before - sessions.len()
    }

    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    debug!(removed, "swept expired sessions");
                }
            }
        })
    }
}
