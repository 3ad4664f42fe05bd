//! Player handles
//!
//! A `Player` is shared by the transport serving its client and by the match
//! it plays in. The client halves of its channels sit in the current
//! `Endpoints`; the match halves form a `Seat` that the match takes when it
//! is created. `reset` wires a fresh pair so the handle can play again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};

use crate::chess::Color;
use crate::error::{Error, Result};
use crate::protocol::{AsyncRequest, AsyncResponse, MatchStart, MoveRequest, MoveResponse};

/// A player has at most one move in flight
const MOVE_BUFFER: usize = 1;
const STREAM_BUFFER: usize = 16;

pub type MatchId = u64;

/// Flags visible to other tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    pub searching: bool,
    pub color: Option<Color>,
    pub match_id: Option<MatchId>,
}

/// A move tagged with its submission number
#[derive(Debug)]
pub(crate) struct Submission {
    pub(crate) seq: u64,
    pub(crate) request: MoveRequest,
}

/// The match's answer to the submission numbered `seq`
#[derive(Debug)]
pub(crate) struct Verdict {
    pub(crate) seq: u64,
    pub(crate) response: MoveResponse,
}

struct MoveLink {
    next_seq: u64,
    submit: mpsc::Sender<Submission>,
    results: mpsc::Receiver<Verdict>,
}

/// Client halves for one match
struct Endpoints {
    moves: Mutex<MoveLink>,
    opponent_moves: Mutex<mpsc::Receiver<MoveRequest>>,
    requests: mpsc::Sender<AsyncRequest>,
    responses: Mutex<mpsc::Receiver<AsyncResponse>>,
    started: Mutex<mpsc::Receiver<MatchStart>>,
    done: watch::Sender<bool>,
}

/// Match halves for one match
pub(crate) struct Seat {
    pub(crate) moves: mpsc::Receiver<Submission>,
    pub(crate) move_results: mpsc::Sender<Verdict>,
    pub(crate) opponent_moves: mpsc::Sender<MoveRequest>,
    pub(crate) requests: mpsc::Receiver<AsyncRequest>,
    pub(crate) responses: mpsc::Sender<AsyncResponse>,
    pub(crate) started: mpsc::Sender<MatchStart>,
    pub(crate) done: watch::Receiver<bool>,
}

fn wire() -> (Arc<Endpoints>, Seat) {
    let (submit, moves) = mpsc::channel(MOVE_BUFFER);
    let (move_results, results) = mpsc::channel(MOVE_BUFFER);
    let (opponent_tx, opponent_rx) = mpsc::channel(STREAM_BUFFER);
    let (requests_tx, requests_rx) = mpsc::channel(STREAM_BUFFER);
    let (responses_tx, responses_rx) = mpsc::channel(STREAM_BUFFER);
    let (started_tx, started_rx) = mpsc::channel(1);
    let (done_tx, done_rx) = watch::channel(false);

    let endpoints = Endpoints {
        moves: Mutex::new(MoveLink {
            next_seq: 0,
            submit,
            results,
        }),
        opponent_moves: Mutex::new(opponent_rx),
        requests: requests_tx,
        responses: Mutex::new(responses_rx),
        started: Mutex::new(started_rx),
        done: done_tx,
    };
    let seat = Seat {
        moves,
        move_results,
        opponent_moves: opponent_tx,
        requests: requests_rx,
        responses: responses_tx,
        started: started_tx,
        done: done_rx,
    };
    (Arc::new(endpoints), seat)
}

/// One participant, human or engine
pub struct Player {
    name: String,
    status: RwLock<PlayerStatus>,
    elapsed_ms: AtomicU64,
    endpoints: StdMutex<Arc<Endpoints>>,
    seat: StdMutex<Option<Seat>>,
}

impl Player {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let (endpoints, seat) = wire();
        Arc::new(Self {
            name: name.into(),
            status: RwLock::new(PlayerStatus::default()),
            elapsed_ms: AtomicU64::new(0),
            endpoints: StdMutex::new(endpoints),
            seat: StdMutex::new(Some(seat)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> PlayerStatus {
        self.read_status().clone()
    }

    pub fn is_searching(&self) -> bool {
        self.read_status().searching
    }

    pub fn in_match(&self) -> bool {
        self.read_status().match_id.is_some()
    }

    pub fn color(&self) -> Option<Color> {
        self.read_status().color
    }

    /// Clock time used so far in the current match
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
    }

    /// Waits for the pool to seat this player in a match
    pub async fn wait_for_match(&self) -> Option<MatchStart> {
        let endpoints = self.endpoints();
        let mut started = endpoints.started.lock().await;
        started.recv().await
    }

    /// Submits a move and waits for the match to judge it. The match only
    /// reads a player's moves on that player's turn.
    ///
    /// A submission abandoned before its verdict arrived still counts; its
    /// verdict is skipped by the next call.
    pub async fn submit_move(&self, request: MoveRequest) -> Result<MoveResponse> {
        if !self.in_match() {
            return Err(Error::ChannelClosed);
        }
        let endpoints = self.endpoints();
        let mut link = endpoints.moves.lock().await;
        link.next_seq += 1;
        let seq = link.next_seq;
        link.submit
            .send(Submission { seq, request })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        loop {
            let verdict = link.results.recv().await.ok_or(Error::ChannelClosed)?;
            if verdict.seq == seq {
                return Ok(verdict.response);
            }
        }
    }

    /// Next move the opponent got accepted; `None` once the match is gone
    pub async fn next_opponent_move(&self) -> Option<MoveRequest> {
        let endpoints = self.endpoints();
        let mut opponent_moves = endpoints.opponent_moves.lock().await;
        opponent_moves.recv().await
    }

    pub async fn request(&self, request: AsyncRequest) -> Result<()> {
        if !self.in_match() {
            return Err(Error::ChannelClosed);
        }
        self.endpoints()
            .requests
            .send(request)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    /// Next draw-offer notice or the final result
    pub async fn next_response(&self) -> Option<AsyncResponse> {
        let endpoints = self.endpoints();
        let mut responses = endpoints.responses.lock().await;
        responses.recv().await
    }

    /// Marks that the client has seen the end of its match
    pub fn client_done(&self) {
        self.endpoints().done.send_replace(true);
    }

    pub(crate) fn begin_search(&self) -> Result<()> {
        let mut status = self.write_status();
        if status.searching || status.match_id.is_some() {
            return Err(Error::PlayerBusy(self.name.clone()));
        }
        status.searching = true;
        Ok(())
    }

    pub(crate) fn cancel_search(&self) {
        self.write_status().searching = false;
    }

    pub(crate) fn take_seat(&self) -> Option<Seat> {
        self.seat.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub(crate) fn join_match(&self, match_id: MatchId, color: Color) {
        let mut status = self.write_status();
        status.searching = false;
        status.color = Some(color);
        status.match_id = Some(match_id);
    }

    pub(crate) fn add_elapsed(&self, elapsed: Duration) {
        self.elapsed_ms
            .fetch_add(elapsed.as_millis() as u64, Ordering::SeqCst);
    }

    /// Fresh channels, zero clock, no match
    pub(crate) fn reset(&self) {
        let (endpoints, seat) = wire();
        *self.endpoints.lock().unwrap_or_else(PoisonError::into_inner) = endpoints;
        *self.seat.lock().unwrap_or_else(PoisonError::into_inner) = Some(seat);
        self.elapsed_ms.store(0, Ordering::SeqCst);
        *self.write_status() = PlayerStatus::default();
    }

    fn endpoints(&self) -> Arc<Endpoints> {
        self.endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn read_status(&self) -> RwLockReadGuard<'_, PlayerStatus> {
        self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_status(&self) -> RwLockWriteGuard<'_, PlayerStatus> {
        self.status.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("name", &self.name)
            .field("status", &*self.read_status())
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn test_search_is_exclusive() {
        let player = Player::new("alice");
        assert!(player.begin_search().is_ok());
        assert!(matches!(player.begin_search(), Err(Error::PlayerBusy(_))));

        player.join_match(7, Color::White);
        assert!(!player.is_searching());
        assert!(player.in_match());
        assert!(player.begin_search().is_err());

        player.reset();
        assert_eq!(player.status(), PlayerStatus::default());
        assert!(player.begin_search().is_ok());
    }

    #[test]
    fn test_reset_rewires_seat_and_clock() {
        let player = Player::new("bob");
        assert!(player.take_seat().is_some());
        assert!(player.take_seat().is_none());
        player.add_elapsed(Duration::from_millis(1500));
        assert_eq!(player.elapsed(), Duration::from_millis(1500));

        player.reset();
        assert!(player.take_seat().is_some());
        assert_eq!(player.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_abandoned_submission_does_not_answer_the_next() {
        let player = Player::new("dave");
        player.join_match(1, Color::White);
        let mut seat = player.take_seat().unwrap();

        let stale = MoveRequest::between("a1".parse().unwrap(), "a5".parse().unwrap());
        let fresh = MoveRequest::between("e2".parse().unwrap(), "e4".parse().unwrap());
        assert!(timeout(Duration::from_millis(50), player.submit_move(stale))
            .await
            .is_err());

        let pending = tokio::spawn({
            let player = Arc::clone(&player);
            async move { player.submit_move(fresh).await }
        });

        let first = seat.moves.recv().await.unwrap();
        assert_eq!(first.request, stale);
        seat.move_results
            .send(Verdict { seq: first.seq, response: MoveResponse::rejected() })
            .await
            .unwrap();
        let second = seat.moves.recv().await.unwrap();
        assert_eq!(second.request, fresh);
        seat.move_results
            .send(Verdict { seq: second.seq, response: MoveResponse::accepted() })
            .await
            .unwrap();

        let response = pending.await.unwrap().unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_requests_outside_a_match_are_refused() {
        let player = Player::new("carol");
        assert!(matches!(
            player.request(AsyncRequest::resignation()).await,
            Err(Error::ChannelClosed)
        ));
    }
}
