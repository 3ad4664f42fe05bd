#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chess_match_core::{
    AsyncResponse, Color, MatchRegistry, MatchSettings, MatchingPool, MoveRequest, Player,
    Position,
};
use tokio::time::{sleep, timeout, Instant};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn sq(name: &str) -> Position {
    name.parse().unwrap()
}

pub fn settings(max_time: Duration) -> MatchSettings {
    MatchSettings {
        max_time,
        delivery_timeout: Duration::from_secs(1),
        client_done_timeout: Duration::from_millis(500),
        random_colors: false,
    }
}

pub struct Seated {
    pub pool: Arc<MatchingPool>,
    pub white: Arc<Player>,
    pub black: Arc<Player>,
}

/// Runs alice (white) against bob (black) in a one-worker pool
pub async fn start_match(max_time: Duration) -> Seated {
    let pool = MatchingPool::new(settings(max_time), 1, 8, MatchRegistry::new(), None);
    pool.start();

    let white = Player::new("alice");
    let black = Player::new("bob");
    pool.match_player(Arc::clone(&white)).unwrap();
    pool.match_player(Arc::clone(&black)).unwrap();

    let white_start = timeout(WAIT, white.wait_for_match()).await.unwrap().unwrap();
    let black_start = timeout(WAIT, black.wait_for_match()).await.unwrap().unwrap();
    assert_eq!(white_start.color, Color::White);
    assert_eq!(white_start.opponent, "bob");
    assert_eq!(black_start.color, Color::Black);
    assert_eq!(black_start.opponent, "alice");

    Seated { pool, white, black }
}

pub async fn play(player: &Player, from: &str, to: &str) -> bool {
    let request = MoveRequest::between(sq(from), sq(to));
    timeout(WAIT, player.submit_move(request))
        .await
        .unwrap()
        .unwrap()
        .success
}

pub async fn next_response(player: &Player) -> AsyncResponse {
    timeout(WAIT, player.next_response()).await.unwrap().unwrap()
}

/// Skips draw-offer notices up to the final result
pub async fn final_result(player: &Player) -> AsyncResponse {
    loop {
        let response = next_response(player).await;
        if response.game_over {
            return response;
        }
    }
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        sleep(Duration::from_millis(10)).await;
    }
}
