//! Upstream feed connector
//!
//! Owns the single outbound connection to the market-data source. Parsed
//! inbound messages are forwarded to the engine over its event channel;
//! incremental subscribe/unsubscribe commands from the engine are written to
//! the socket while it is open. On connection loss the connector sleeps for
//! a fixed delay and reconnects, indefinitely — the engine re-issues the
//! batched subscribe for the current aggregate set once the new connection
//! is announced, so commands that raced a disconnect are implicitly
//! satisfied.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, info, warn};
use types::ids::ProductId;

use crate::engine::EngineEvent;
use crate::protocol::{FeedMessage, FeedRequest};

/// Incremental subscription command from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedCommand {
    Subscribe(Vec<ProductId>),
    Unsubscribe(Vec<ProductId>),
}

/// Maps an engine command onto the upstream wire request.
fn request_for(command: FeedCommand) -> FeedRequest {
    match command {
        FeedCommand::Subscribe(products) => FeedRequest::subscribe(products),
        FeedCommand::Unsubscribe(products) => FeedRequest::unsubscribe(products),
    }
}

/// Outcome of one connection's message pump.
enum PumpExit {
    /// The connection was lost; reconnect after the fixed delay.
    Disconnected,
    /// The engine is gone; shut the connector down.
    EngineGone,
}

/// Maintains exactly one logical connection to the upstream feed.
pub struct FeedConnector {
    url: String,
    reconnect_delay: Duration,
    engine_tx: mpsc::Sender<EngineEvent>,
    commands: mpsc::Receiver<FeedCommand>,
}

impl FeedConnector {
    pub fn new(
        url: String,
        reconnect_delay: Duration,
        engine_tx: mpsc::Sender<EngineEvent>,
        commands: mpsc::Receiver<FeedCommand>,
    ) -> Self {
        Self {
            url,
            reconnect_delay,
            engine_tx,
            commands,
        }
    }

    /// Connect-pump-reconnect loop. Runs until the engine side shuts down.
    pub async fn run(mut self) {
        loop {
            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    info!(url = %self.url, "Connected to upstream feed");
                    if self
                        .engine_tx
                        .send(EngineEvent::UpstreamConnected)
                        .await
                        .is_err()
                    {
                        return;
                    }

                    match self.pump(ws).await {
                        PumpExit::Disconnected => {
                            if self.engine_tx.send(EngineEvent::UpstreamDown).await.is_err() {
                                return;
                            }
                        }
                        PumpExit::EngineGone => return,
                    }
                }
                Err(error) => {
                    error!(url = %self.url, %error, "Upstream connection failed");
                }
            }

            // Commands issued against the dead connection are superseded by
            // the batched resubscribe after reconnect.
            while self.commands.try_recv().is_ok() {}

            info!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Reconnecting to upstream"
            );
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Pump one live connection: forward inbound messages to the engine and
    /// write engine commands to the socket.
    async fn pump(&mut self, ws: WebSocketStream<MaybeTlsStream<TcpStream>>) -> PumpExit {
        let (mut write, mut read) = ws.split();

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        return PumpExit::EngineGone;
                    };
                    let request = request_for(command);
                    let json = match serde_json::to_string(&request) {
                        Ok(json) => json,
                        Err(error) => {
                            error!(%error, "Failed to encode upstream request");
                            continue;
                        }
                    };
                    debug!(request = %json, "Sending upstream request");
                    if write.send(Message::Text(json.into())).await.is_err() {
                        error!("Upstream send failed");
                        return PumpExit::Disconnected;
                    }
                }
                message = read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<FeedMessage>(&text) {
                                Ok(parsed) => {
                                    if self
                                        .engine_tx
                                        .send(EngineEvent::Upstream(parsed))
                                        .await
                                        .is_err()
                                    {
                                        return PumpExit::EngineGone;
                                    }
                                }
                                Err(error) => {
                                    warn!(%error, "Ignoring unrecognized upstream message");
                                }
                            }
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // Pong replies are handled by tungstenite.
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "Upstream closed connection");
                            return PumpExit::Disconnected;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            error!(%error, "Upstream transport error");
                            return PumpExit::Disconnected;
                        }
                        None => {
                            info!("Upstream stream ended");
                            return PumpExit::Disconnected;
                        }
                    }
                }
            }
        }
    }
}
