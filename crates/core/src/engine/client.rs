//! Engine connection and seat driver

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::wire::EngineMessage;
use crate::error::{Error, Result};
use crate::player::Player;
use crate::protocol::{AsyncRequest, MatchStart};

/// Handle to an external engine reachable at a fixed address.
///
/// Every engine match opens its own connection. Any stream failure disables
/// the client for the rest of the process.
#[derive(Debug)]
pub struct EngineClient {
    address: String,
    connect_timeout: Duration,
    enabled: AtomicBool,
}

/// One open engine connection
struct EngineStream {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl EngineStream {
    fn new(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: BufReader::new(read).lines(),
            writer: write,
        }
    }

    async fn send(&mut self, message: &EngineMessage) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next message, skipping blank lines; `None` at end of stream
    async fn recv(&mut self) -> Result<Option<EngineMessage>> {
        while let Some(line) = self.reader.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return Ok(Some(serde_json::from_str(line)?));
        }
        Ok(None)
    }
}

impl EngineClient {
    /// Checks that the engine accepts connections within `connect_timeout`
    pub async fn connect(address: impl Into<String>, connect_timeout: Duration) -> Result<Arc<Self>> {
        let client = Self {
            address: address.into(),
            connect_timeout,
            enabled: AtomicBool::new(true),
        };
        client.open().await?;
        info!(address = %client.address, "engine reachable");
        Ok(Arc::new(client))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn disable(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            warn!(address = %self.address, "engine matches disabled");
        }
    }

    async fn open(&self) -> Result<EngineStream> {
        let stream = timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| Error::EngineUnavailable(format!("{}: connect timed out", self.address)))?
            .map_err(|e| Error::EngineUnavailable(format!("{}: {e}", self.address)))?;
        stream.set_nodelay(true)?;
        Ok(EngineStream::new(stream))
    }

    /// Plays `bot`'s next match with the engine.
    ///
    /// When the engine misbehaves the bot resigns and the client is
    /// disabled; the match itself always runs to completion.
    pub async fn drive(self: Arc<Self>, bot: Arc<Player>) {
        let Some(start) = bot.wait_for_match().await else {
            return;
        };

        if let Err(e) = self.relay(&bot, &start).await {
            warn!(error = %e, "engine failed mid-match, resigning");
            self.disable();
            if bot.in_match() {
                let _ = bot.request(AsyncRequest::resignation()).await;
                wait_for_result(&bot).await;
            }
        }
        bot.client_done();
    }

    /// Forwards moves both ways until the game ends
    async fn relay(&self, bot: &Player, start: &MatchStart) -> Result<()> {
        let mut stream = self.open().await?;
        stream
            .send(&EngineMessage::MatchStart {
                color: start.color,
                max_time_ms: start.max_time_ms,
            })
            .await?;

        loop {
            tokio::select! {
                biased;
                response = bot.next_response() => match response {
                    Some(response) if response.game_over => return Ok(()),
                    Some(_) => {}
                    None => return Ok(()),
                },
                Some(request) = bot.next_opponent_move() => {
                    if let Some(message) = EngineMessage::from_request(&request) {
                        stream.send(&message).await?;
                    }
                }
                message = stream.recv() => {
                    let Some(message) = message? else {
                        // a closed stream is fine once the game is decided
                        return match timeout(self.connect_timeout, wait_for_result(bot)).await {
                            Ok(()) => Ok(()),
                            Err(_) => Err(Error::EngineProtocol("engine closed the stream".into())),
                        };
                    };
                    let request = message
                        .clone()
                        .into_request()
                        .ok_or_else(|| Error::EngineProtocol(format!("unexpected message {message:?}")))?;
                    debug!(?request, "engine move");
                    match bot.submit_move(request).await {
                        Ok(response) if response.success => {}
                        Ok(_) => {
                            return Err(Error::EngineProtocol(format!("illegal move {request:?}")))
                        }
                        Err(Error::ChannelClosed) => return Ok(()),
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }
}

/// Drains `player`'s responses up to the final result
async fn wait_for_result(player: &Player) {
    while let Some(response) = player.next_response().await {
        if response.game_over {
            break;
        }
    }
}
