use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use chess_match_core::{Config, EngineClient, MatchRegistry, MatchingPool, SessionStore};

mod routes;

pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub pool: Arc<MatchingPool>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match Config::from_env().and_then(|config| config.validate().map(|()| config)) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let engine = match &config.engine_address {
        Some(address) => match EngineClient::connect(address.as_str(), config.engine_connect_timeout).await {
            Ok(engine) => Some(engine),
            Err(e) => {
                warn!(error = %e, "engine matches disabled");
                None
            }
        },
        None => None,
    };

    let registry = MatchRegistry::new();
    let pool = MatchingPool::new(
        config.match_settings(),
        config.workers,
        config.queue_capacity,
        Arc::clone(&registry),
        engine,
    );
    pool.start();

    let sessions = SessionStore::new(config.session_ttl);
    Arc::clone(&sessions).spawn_sweeper(config.sweep_interval);
    registry.spawn_sweeper(config.sweep_interval);

    let state = Arc::new(AppState {
        sessions,
        pool: Arc::clone(&pool),
    });

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/login", post(routes::login))
        .route("/matches", get(routes::live_matches))
        .route("/match", post(routes::play::find_match).get(routes::play::await_match))
        .route("/match/engine", post(routes::play::find_engine_match))
        .route("/move", post(routes::play::submit_move))
        .route("/move/opponent", get(routes::play::opponent_move))
        .route("/request", post(routes::play::send_request).get(routes::play::next_response))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .expect("Failed to bind listen address");

    info!("Server running at http://{}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            pool.shutdown();
        })
        .await
        .expect("Server error");
}
