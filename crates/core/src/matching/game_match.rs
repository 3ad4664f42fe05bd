//! A running match
//!
//! Two tasks share one `Match`: the turn task reads the side to move's
//! submissions against its clock, the request task handles resignations and
//! draw offers from either side at any time. Whichever task ends the game goes
//! through `finish`, which runs once, broadcasts the result and flips the
//! `over` watch that stops the other task. Draw-offer notices leave the
//! request task through one forwarder per recipient, which keeps them in
//! order without holding up the next request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use super::MatchSettings;
use crate::chess::Color;
use crate::error::{Error, Result};
use crate::game::{Game, GameResult, MoveRecord, Termination};
use crate::player::{MatchId, Player, Seat, Submission, Verdict};
use crate::protocol::{AsyncRequest, AsyncResponse, MatchStart, MoveRequest, MoveResponse};

/// Pending draw notices per recipient
const NOTICE_BUFFER: usize = 16;

/// Turn-task halves of one seat
struct TurnLinks {
    moves: mpsc::Receiver<Submission>,
    results: mpsc::Sender<Verdict>,
    opponent_moves: mpsc::Sender<MoveRequest>,
}

enum DrawOffer {
    Opened,
    Withdrawn,
    Accepted,
}

pub struct Match {
    id: MatchId,
    /// Indexed by `Color::index`
    players: [Arc<Player>; 2],
    names: [String; 2],
    game: Mutex<Game>,
    max_time: Duration,
    delivery_timeout: Duration,
    client_done_timeout: Duration,
    requested_draw: RwLock<Option<Color>>,
    concluded: AtomicBool,
    over: watch::Sender<bool>,
    responses: [mpsc::Sender<AsyncResponse>; 2],
}

impl Match {
    /// Seats both players and returns the match with their seats.
    ///
    /// Fails when either player's seat is already taken; both players are
    /// reset in that case.
    pub(crate) fn new(
        id: MatchId,
        white: Arc<Player>,
        black: Arc<Player>,
        settings: &MatchSettings,
    ) -> Result<(Arc<Self>, [Seat; 2])> {
        let (Some(white_seat), Some(black_seat)) = (white.take_seat(), black.take_seat()) else {
            white.reset();
            black.reset();
            return Err(Error::ChannelClosed);
        };

        let names = if white.name() == black.name() {
            [
                format!("{} ({})", white.name(), Color::White),
                format!("{} ({})", black.name(), Color::Black),
            ]
        } else {
            [white.name().to_string(), black.name().to_string()]
        };
        white.join_match(id, Color::White);
        black.join_match(id, Color::Black);

        let (over, _) = watch::channel(false);
        let game_match = Arc::new(Self {
            id,
            responses: [white_seat.responses.clone(), black_seat.responses.clone()],
            players: [white, black],
            names,
            game: Mutex::new(Game::new()),
            max_time: settings.max_time,
            delivery_timeout: settings.delivery_timeout,
            client_done_timeout: settings.client_done_timeout,
            requested_draw: RwLock::new(None),
            concluded: AtomicBool::new(false),
            over,
        });
        Ok((game_match, [white_seat, black_seat]))
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    /// Display name of the player holding `color`
    pub fn name(&self, color: Color) -> &str {
        &self.names[color.index()]
    }

    pub fn is_over(&self) -> bool {
        self.lock_game().is_over()
    }

    pub fn result(&self) -> Option<GameResult> {
        self.lock_game().result()
    }

    pub fn history(&self) -> Vec<MoveRecord> {
        self.lock_game().history().to_vec()
    }

    /// Opens each player's match-start gate
    pub(crate) fn announce(&self, seats: &[Seat; 2]) {
        for color in Color::ALL {
            let start = MatchStart {
                color,
                opponent: self.names[color.opponent().index()].clone(),
                max_time_ms: self.max_time.as_millis() as u64,
            };
            if seats[color.index()].started.try_send(start).is_err() {
                warn!(match_id = self.id, %color, "match start not delivered");
            }
        }
    }

    /// Plays the match to the end, waits for both clients, then resets the
    /// players.
    pub(crate) async fn run(self: Arc<Self>, seats: [Seat; 2]) {
        info!(
            match_id = self.id,
            white = %self.names[0],
            black = %self.names[1],
            "match started"
        );

        let [white, black] = seats;
        let turn_links = [
            TurnLinks {
                moves: white.moves,
                results: white.move_results,
                opponent_moves: white.opponent_moves,
            },
            TurnLinks {
                moves: black.moves,
                results: black.move_results,
                opponent_moves: black.opponent_moves,
            },
        ];

        let (white_notices, white_pending) = mpsc::channel(NOTICE_BUFFER);
        let (black_notices, black_pending) = mpsc::channel(NOTICE_BUFFER);
        let forwarders = [
            tokio::spawn(Arc::clone(&self).forward_notices(white_pending, white.responses)),
            tokio::spawn(Arc::clone(&self).forward_notices(black_pending, black.responses)),
        ];

        let turns = tokio::spawn(Arc::clone(&self).turn_loop(turn_links));
        let requests = tokio::spawn(
            Arc::clone(&self).request_loop([white.requests, black.requests], [white_notices, black_notices]),
        );

        if let Err(e) = turns.await {
            warn!(match_id = self.id, error = %e, "turn task failed");
        }
        // the turn task only returns once the game is over
        self.over.send_replace(true);
        if let Err(e) = requests.await {
            warn!(match_id = self.id, error = %e, "request task failed");
        }
        for forwarder in forwarders {
            if let Err(e) = forwarder.await {
                warn!(match_id = self.id, error = %e, "notice forwarder failed");
            }
        }

        let (white_done, black_done) = tokio::join!(
            client_finished(white.done, self.client_done_timeout),
            client_finished(black.done, self.client_done_timeout),
        );
        if !(white_done && black_done) {
            debug!(match_id = self.id, white_done, black_done, "clients did not confirm the result");
        }

        for player in &self.players {
            player.reset();
        }
        info!(match_id = self.id, "match closed");
    }

    async fn turn_loop(self: Arc<Self>, mut links: [TurnLinks; 2]) {
        let mut over = self.over.subscribe();

        while let Some(side) = self.side_to_move() {
            let idx = side.index();
            let player = Arc::clone(&self.players[idx]);
            let started = Instant::now();
            let budget = self.max_time.saturating_sub(player.elapsed());
            let deadline = started + budget;

            loop {
                let received = tokio::select! {
                    biased;
                    _ = game_over(&mut over) => return,
                    _ = sleep_until(deadline) => None,
                    request = links[idx].moves.recv() => Some(request),
                };

                let Submission { seq, request } = match received {
                    Some(Some(submission)) => submission,
                    Some(None) => {
                        // the client half is gone; only the clock or the other
                        // side can end this turn now
                        tokio::select! {
                            biased;
                            _ = game_over(&mut over) => return,
                            _ = sleep_until(deadline) => {}
                        }
                        self.flag(side, &player, budget).await;
                        return;
                    }
                    None => {
                        self.flag(side, &player, budget).await;
                        return;
                    }
                };

                let (accepted, result) = {
                    let mut game = self.lock_game();
                    let accepted = game.make_move(request.origin, request.mv, request.promotion);
                    (accepted, game.result())
                };

                if !accepted {
                    debug!(match_id = self.id, color = %side, ?request, "move rejected");
                    let verdict = Verdict { seq, response: MoveResponse::rejected() };
                    self.deliver(&links[idx].results, verdict, "move result").await;
                    continue;
                }

                debug!(match_id = self.id, color = %side, ?request, "move accepted");
                player.add_elapsed(started.elapsed());
                *self.requested_draw.write().unwrap_or_else(PoisonError::into_inner) = None;
                let opponent = side.opponent().index();
                self.deliver(&links[opponent].opponent_moves, request, "opponent move")
                    .await;
                let verdict = Verdict { seq, response: MoveResponse::accepted() };
                self.deliver(&links[idx].results, verdict, "move result").await;

                if let Some(result) = result {
                    self.finish(result).await;
                    return;
                }
                break;
            }
        }
    }

    async fn request_loop(
        self: Arc<Self>,
        requests: [mpsc::Receiver<AsyncRequest>; 2],
        notices: [mpsc::Sender<AsyncResponse>; 2],
    ) {
        let [mut white, mut black] = requests;
        let mut over = self.over.subscribe();

        loop {
            let (color, request) = tokio::select! {
                biased;
                _ = game_over(&mut over) => return,
                Some(request) = white.recv() => (Color::White, request),
                Some(request) = black.recv() => (Color::Black, request),
            };
            if self.concluded.load(Ordering::SeqCst) {
                return;
            }

            if request.resign {
                info!(match_id = self.id, %color, "resigned");
                self.finish(GameResult::win(color.opponent(), Termination::Resignation))
                    .await;
                return;
            }
            if request.request_to_draw {
                self.toggle_draw(color, &notices[color.opponent().index()])
                    .await;
            }
        }
    }

    /// Opens, withdraws or accepts a draw offer on behalf of `color`;
    /// `opponent` queues notices for the other side
    async fn toggle_draw(&self, color: Color, opponent: &mpsc::Sender<AsyncResponse>) {
        let offer = {
            let mut holder = self.requested_draw.write().unwrap_or_else(PoisonError::into_inner);
            match *holder {
                Some(holding) if holding == color => {
                    *holder = None;
                    DrawOffer::Withdrawn
                }
                Some(_) => DrawOffer::Accepted,
                None => {
                    *holder = Some(color);
                    DrawOffer::Opened
                }
            }
        };

        let notice = match offer {
            DrawOffer::Opened => {
                debug!(match_id = self.id, %color, "draw offered");
                AsyncResponse::draw_offer(true)
            }
            DrawOffer::Withdrawn => {
                debug!(match_id = self.id, %color, "draw offer withdrawn");
                AsyncResponse::draw_offer(false)
            }
            DrawOffer::Accepted => {
                self.finish(GameResult::draw(Termination::DrawAgreed)).await;
                return;
            }
        };
        if opponent.try_send(notice).is_err() {
            warn!(match_id = self.id, %color, "draw notice dropped");
        }
    }

    /// Hands queued draw notices to one player until the game ends
    async fn forward_notices(
        self: Arc<Self>,
        mut pending: mpsc::Receiver<AsyncResponse>,
        to: mpsc::Sender<AsyncResponse>,
    ) {
        let mut over = self.over.subscribe();
        loop {
            let notice = tokio::select! {
                biased;
                _ = game_over(&mut over) => return,
                notice = pending.recv() => notice,
            };
            let Some(notice) = notice else {
                return;
            };
            self.deliver(&to, notice, "draw offer").await;
        }
    }

    /// Ends the game on time for `side`
    async fn flag(&self, side: Color, player: &Player, budget: Duration) {
        player.add_elapsed(budget);
        self.finish(GameResult::win(side.opponent(), Termination::Timeout))
            .await;
    }

    /// Terminal handler: records the result, tells both players, signals
    /// game over. Only the first call has any effect.
    async fn finish(&self, result: GameResult) {
        // under the game lock so no move lands after the result is decided
        let result = {
            let mut game = self.lock_game();
            if self.concluded.swap(true, Ordering::SeqCst) {
                return;
            }
            game.conclude(result)
        };
        let winner = result
            .winner
            .map(|color| self.names[color.index()].clone())
            .unwrap_or_default();
        info!(
            match_id = self.id,
            reason = ?result.reason,
            winner = %winner,
            "match over"
        );

        let payload = AsyncResponse::game_over(&result, winner);
        let [white, black] = &self.responses;
        tokio::join!(
            self.deliver(white, payload.clone(), "result"),
            self.deliver(black, payload, "result"),
        );
        self.over.send_replace(true);
    }

    /// Sends `message` with a bounded wait; `false` when it was dropped
    async fn deliver<T>(&self, to: &mpsc::Sender<T>, message: T, what: &str) -> bool {
        match timeout(self.delivery_timeout, to.send(message)).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => {
                debug!(match_id = self.id, what, "receiver gone");
                false
            }
            Err(_) => {
                warn!(match_id = self.id, what, "delivery timed out");
                false
            }
        }
    }

    fn side_to_move(&self) -> Option<Color> {
        let game = self.lock_game();
        (!game.is_over()).then(|| game.turn())
    }

    fn lock_game(&self) -> MutexGuard<'_, Game> {
        self.game.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Match")
            .field("id", &self.id)
            .field("white", &self.names[0])
            .field("black", &self.names[1])
            .field("concluded", &self.concluded.load(Ordering::SeqCst))
            .finish()
    }
}

async fn game_over(over: &mut watch::Receiver<bool>) {
    let _ = over.wait_for(|over| *over).await;
}

async fn client_finished(mut done: watch::Receiver<bool>, limit: Duration) -> bool {
    matches!(timeout(limit, done.wait_for(|done| *done)).await, Ok(Ok(_)))
}
