use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use chess_match_core::matching::MatchSummary;
use chess_match_core::{Error, Player};

use crate::AppState;

pub mod play;

/// Errors a handler can answer with
#[derive(Debug)]
pub enum AppError {
    Unauthorized,
    BadRequest(String),
    Core(Error),
}

impl From<Error> for AppError {
    fn from(error: Error) -> Self {
        AppError::Core(error)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Core(Error::PlayerBusy(_)) => StatusCode::CONFLICT,
            AppError::Core(Error::ChannelClosed) => StatusCode::GONE,
            AppError::Core(Error::PoolFull | Error::PoolClosed) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::Unauthorized => "unknown or expired token".to_string(),
            AppError::BadRequest(reason) => reason,
            AppError::Core(e) => e.to_string(),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

/// Resolves a session token to its player
pub fn authorize(state: &AppState, token: &str) -> Result<Arc<Player>, AppError> {
    state.sessions.get(token).ok_or(AppError::Unauthorized)
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub name: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_string()));
    }

    let token = state.sessions.create(Player::new(name));
    tracing::info!(player = name, "logged in");
    Ok(Json(LoginResponse { token }))
}

pub async fn live_matches(State(state): State<Arc<AppState>>) -> Json<Vec<MatchSummary>> {
    Json(state.pool.registry().summaries())
}

pub async fn health() -> &'static str {
    "OK"
}
