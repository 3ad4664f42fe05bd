//! Matching pool: queues waiting players and runs them in pairs
//!
//! Every worker owns at most one match at a time, so the worker count bounds
//! the number of concurrent matches. Pairing happens under one async lock
//! held from the first dequeue until both players have been told their
//! match started, which keeps two workers from splitting a pair. A human
//! dequeued without a partner is held aside while the worker keeps serving
//! engine seekers.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Match, MatchRegistry, MatchSettings};
use crate::engine::EngineClient;
use crate::error::{Error, Result};
use crate::player::{Player, Seat};

/// Name given to engine-driven players
pub const ENGINE_NAME: &str = "engine";

type Queue = StdMutex<Option<mpsc::Sender<Arc<Player>>>>;

struct Queues {
    humans: mpsc::Receiver<Arc<Player>>,
    engine_seekers: mpsc::Receiver<Arc<Player>>,
    /// Dequeued human still waiting for a partner
    held: Option<Arc<Player>>,
}

enum Seeker {
    Human(Arc<Player>),
    Engine(Arc<Player>),
}

pub struct MatchingPool {
    settings: MatchSettings,
    workers: usize,
    registry: Arc<MatchRegistry>,
    engine: Option<Arc<EngineClient>>,
    humans: Queue,
    engine_seekers: Queue,
    queues: Mutex<Queues>,
    next_id: AtomicU64,
    started: AtomicU64,
    waiting: AtomicUsize,
    handles: StdMutex<Vec<JoinHandle<()>>>,
}

impl MatchingPool {
    pub fn new(
        settings: MatchSettings,
        workers: usize,
        queue_capacity: usize,
        registry: Arc<MatchRegistry>,
        engine: Option<Arc<EngineClient>>,
    ) -> Arc<Self> {
        let (humans_tx, humans_rx) = mpsc::channel(queue_capacity);
        let (engine_tx, engine_rx) = mpsc::channel(queue_capacity);

        Arc::new(Self {
            settings,
            workers,
            registry,
            engine,
            humans: StdMutex::new(Some(humans_tx)),
            engine_seekers: StdMutex::new(Some(engine_tx)),
            queues: Mutex::new(Queues {
                humans: humans_rx,
                engine_seekers: engine_rx,
                held: None,
            }),
            next_id: AtomicU64::new(0),
            started: AtomicU64::new(0),
            waiting: AtomicUsize::new(0),
            handles: StdMutex::new(Vec::new()),
        })
    }

    /// Spawns the workers. Calling it again has no effect.
    pub fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if !handles.is_empty() {
            return;
        }
        for worker in 0..self.workers {
            handles.push(tokio::spawn(Arc::clone(self).work(worker)));
        }
        info!(workers = self.workers, "matching pool started");
    }

    /// Queues `player` for a match against another human
    pub fn match_player(&self, player: Arc<Player>) -> Result<()> {
        self.enqueue(&self.humans, player)
    }

    /// Queues `player` for a match against the engine, or against a human
    /// when no engine is available
    pub fn match_engine(&self, player: Arc<Player>) -> Result<()> {
        match &self.engine {
            Some(engine) if engine.is_enabled() => self.enqueue(&self.engine_seekers, player),
            _ => self.match_player(player),
        }
    }

    pub fn engine_enabled(&self) -> bool {
        self.engine.as_ref().is_some_and(|engine| engine.is_enabled())
    }

    pub fn registry(&self) -> &Arc<MatchRegistry> {
        &self.registry
    }

    pub fn matches_started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Players queued but not yet paired
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Stops accepting players. Workers pair whoever is still queued, finish
    /// their current match and exit.
    pub fn shutdown(&self) {
        self.humans.lock().unwrap_or_else(PoisonError::into_inner).take();
        self.engine_seekers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        info!("matching pool closed");
    }

    fn enqueue(&self, queue: &Queue, player: Arc<Player>) -> Result<()> {
        player.begin_search()?;
        let sender = queue.lock().unwrap_or_else(PoisonError::into_inner).clone();
        let Some(sender) = sender else {
            player.cancel_search();
            return Err(Error::PoolClosed);
        };

        self.waiting.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(Arc::clone(&player)) {
            Ok(()) => {
                debug!(player = player.name(), "queued for a match");
                Ok(())
            }
            Err(e) => {
                self.waiting.fetch_sub(1, Ordering::SeqCst);
                player.cancel_search();
                Err(match e {
                    TrySendError::Full(_) => Error::PoolFull,
                    TrySendError::Closed(_) => Error::PoolClosed,
                })
            }
        }
    }

    async fn work(self: Arc<Self>, worker: usize) {
        while let Some((game_match, seats)) = self.pair().await {
            let id = game_match.id();
            debug!(worker, match_id = id, "running match");
            game_match.run(seats).await;
            self.registry.remove(id);
        }
        debug!(worker, "worker stopped");
    }

    /// Dequeues the next pair and starts their match. `None` once the
    /// queues are closed and drained.
    async fn pair(&self) -> Option<(Arc<Match>, [Seat; 2])> {
        let mut guard = self.queues.lock().await;
        let queues = &mut *guard;

        loop {
            let seeker = tokio::select! {
                Some(player) = queues.humans.recv() => Seeker::Human(player),
                Some(player) = queues.engine_seekers.recv() => Seeker::Engine(player),
                else => {
                    if let Some(player) = queues.held.take() {
                        player.cancel_search();
                    }
                    return None;
                }
            };
            self.waiting.fetch_sub(1, Ordering::SeqCst);

            let (player, bot) = match seeker {
                Seeker::Engine(player) => (player, self.engine_opponent()),
                Seeker::Human(player) => (player, None),
            };
            let (first, second) = match (bot, queues.held.take()) {
                (Some(bot), held) => {
                    queues.held = held;
                    (player, bot)
                }
                (None, Some(held)) => (held, player),
                (None, None) => {
                    debug!(player = player.name(), "waiting for a partner");
                    queues.held = Some(player);
                    continue;
                }
            };

            let (white, black) = if self.settings.random_colors && rand::random::<bool>() {
                (second, first)
            } else {
                (first, second)
            };

            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            match Match::new(id, white, black, &self.settings) {
                Ok((game_match, seats)) => {
                    self.registry.register(&game_match);
                    game_match.announce(&seats);
                    self.started.fetch_add(1, Ordering::SeqCst);
                    return Some((game_match, seats));
                }
                Err(e) => warn!(match_id = id, error = %e, "could not seat players"),
            }
        }
    }

    /// A fresh engine-driven player, when the engine is still usable
    fn engine_opponent(&self) -> Option<Arc<Player>> {
        let engine = self.engine.as_ref().filter(|engine| engine.is_enabled())?;
        let bot = Player::new(ENGINE_NAME);
        bot.begin_search().ok()?;
        tokio::spawn(Arc::clone(engine).drive(Arc::clone(&bot)));
        Some(bot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: usize) -> Arc<MatchingPool> {
        MatchingPool::new(MatchSettings::default(), 1, capacity, MatchRegistry::new(), None)
    }

    #[test]
    fn test_busy_player_is_refused() {
        let pool = pool(4);
        let player = Player::new("alice");
        pool.match_player(Arc::clone(&player)).unwrap();
        assert!(matches!(
            pool.match_player(Arc::clone(&player)),
            Err(Error::PlayerBusy(_))
        ));
        assert_eq!(pool.waiting(), 1);
    }

    #[test]
    fn test_full_queue_reverts_search() {
        let pool = pool(1);
        pool.match_player(Player::new("alice")).unwrap();
        let bob = Player::new("bob");
        assert!(matches!(pool.match_player(Arc::clone(&bob)), Err(Error::PoolFull)));
        assert!(!bob.is_searching());
        assert_eq!(pool.waiting(), 1);
    }

    #[test]
    fn test_engine_queue_falls_back_without_engine() {
        let pool = pool(4);
        assert!(!pool.engine_enabled());
        pool.match_engine(Player::new("alice")).unwrap();
        assert_eq!(pool.waiting(), 1);
    }

    #[test]
    fn test_closed_pool_refuses_players() {
        let pool = pool(4);
        pool.shutdown();
        let player = Player::new("alice");
        assert!(matches!(pool.match_player(Arc::clone(&player)), Err(Error::PoolClosed)));
        assert!(!player.is_searching());
    }
}
