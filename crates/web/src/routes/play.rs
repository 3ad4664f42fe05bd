//! Match play over long-polling HTTP
//!
//! Each handler resolves the caller's token and relays one message to or
//! from its `Player` handle. Waiting handlers return when the match has
//! something for the client; a closed match answers 410.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use chess_match_core::{
    AsyncRequest, AsyncResponse, Error, MatchStart, MoveRequest, MoveResponse, Player,
};

use super::{authorize, AppError};
use crate::AppState;

#[derive(Deserialize)]
pub struct TokenBody {
    pub token: String,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Deserialize)]
pub struct MoveBody {
    pub token: String,
    #[serde(flatten)]
    pub request: MoveRequest,
}

#[derive(Deserialize)]
pub struct RequestBody {
    pub token: String,
    #[serde(flatten)]
    pub request: AsyncRequest,
}

async fn wait_for_start(player: &Player) -> Result<Json<MatchStart>, AppError> {
    player
        .wait_for_match()
        .await
        .map(Json)
        .ok_or(AppError::Core(Error::ChannelClosed))
}

/// Queues the caller against another human and waits for the match
pub async fn find_match(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TokenBody>,
) -> Result<Json<MatchStart>, AppError> {
    let player = authorize(&state, &body.token)?;
    state.pool.match_player(Arc::clone(&player))?;
    wait_for_start(&player).await
}

pub async fn find_engine_match(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TokenBody>,
) -> Result<Json<MatchStart>, AppError> {
    let player = authorize(&state, &body.token)?;
    state.pool.match_engine(Arc::clone(&player))?;
    wait_for_start(&player).await
}

/// Resumes waiting after a dropped `POST /match`
pub async fn await_match(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<MatchStart>, AppError> {
    let player = authorize(&state, &query.token)?;
    if !player.is_searching() && !player.in_match() {
        return Err(AppError::BadRequest("not searching for a match".to_string()));
    }
    wait_for_start(&player).await
}

pub async fn submit_move(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MoveBody>,
) -> Result<Json<MoveResponse>, AppError> {
    let player = authorize(&state, &body.token)?;
    let response = player.submit_move(body.request).await?;
    Ok(Json(response))
}

pub async fn opponent_move(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<MoveRequest>, AppError> {
    let player = authorize(&state, &query.token)?;
    player
        .next_opponent_move()
        .await
        .map(Json)
        .ok_or(AppError::Core(Error::ChannelClosed))
}

pub async fn send_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RequestBody>,
) -> Result<StatusCode, AppError> {
    let player = authorize(&state, &body.token)?;
    player.request(body.request).await?;
    Ok(StatusCode::ACCEPTED)
}

/// Waits for a draw-offer notice or the result. Handing out the result
/// releases the player for its next match.
pub async fn next_response(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<AsyncResponse>, AppError> {
    let player = authorize(&state, &query.token)?;
    let response = player
        .next_response()
        .await
        .ok_or(AppError::Core(Error::ChannelClosed))?;
    if response.game_over {
        player.client_done();
    }
    Ok(Json(response))
}
