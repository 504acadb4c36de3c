//! Chain head tracking per network.
//!
//! With a streaming-socket endpoint the subscriber keeps one `eth_subscribe("newHeads")`
//! connection open and reconnects with exponential backoff. Without one it polls
//! `eth_blockNumber`. Either way every head number is handed to a [`HeadListener`].

use super::{dispatcher::UpstreamDispatcher, UpstreamError};
use crate::{sync::LogSource, utils::hex::quantity_from_json};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Receives new chain heads.
#[async_trait]
pub trait HeadListener: Send + Sync + 'static {
    async fn on_new_head(&self, number: u64);
}

/// How heads are discovered.
#[derive(Debug, Clone)]
pub enum HeadSource {
    Subscribe(Url),
    Poll { dispatcher: Arc<UpstreamDispatcher>, interval: Duration },
}

/// Background task feeding a [`HeadListener`].
#[derive(Debug)]
pub struct HeadSubscriber {
    network: String,
    source: HeadSource,
}

impl HeadSubscriber {
    #[must_use]
    pub fn new(network: impl Into<String>, source: HeadSource) -> Self {
        Self { network: network.into(), source }
    }

    /// Runs until `shutdown` fires.
    pub fn spawn(
        self,
        listener: Arc<dyn HeadListener>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            match &self.source {
                HeadSource::Subscribe(url) => self.run_subscription(url, listener, shutdown).await,
                HeadSource::Poll { dispatcher, interval } => {
                    self.run_polling(dispatcher, *interval, listener, shutdown).await;
                }
            }
            info!(network = %self.network, "head subscriber stopped");
        })
    }

    async fn run_subscription(
        &self,
        url: &Url,
        listener: Arc<dyn HeadListener>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut reconnect_delay = INITIAL_RECONNECT_DELAY;

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                result = self.subscribe_once(url, &listener) => {
                    match result {
                        Ok(()) => {
                            info!(network = %self.network, "head subscription ended, reconnecting");
                            reconnect_delay = INITIAL_RECONNECT_DELAY;
                        }
                        Err(e) => {
                            error!(
                                network = %self.network,
                                error = %e,
                                reconnect_delay_secs = reconnect_delay.as_secs(),
                                "head subscription failed, will retry"
                            );
                        }
                    }
                }
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                () = tokio::time::sleep(reconnect_delay) => {}
            }
            reconnect_delay = std::cmp::min(reconnect_delay * 2, MAX_RECONNECT_DELAY);
        }
    }

    /// One connection lifetime. Returns `Ok` when the server closes the stream.
    async fn subscribe_once(
        &self,
        url: &Url,
        listener: &Arc<dyn HeadListener>,
    ) -> Result<(), UpstreamError> {
        let (stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| UpstreamError::ConnectionFailed(format!("WebSocket connection failed: {e}")))?;
        let (mut write, mut read) = stream.split();

        let subscribe = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newHeads"]
        });
        write
            .send(Message::Text(subscribe.to_string().into()))
            .await
            .map_err(|e| UpstreamError::ConnectionFailed(format!("WebSocket send error: {e}")))?;
        info!(network = %self.network, "subscribed to new heads");

        while let Some(message) = read.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Some(number) = head_number(text.as_str()) {
                        let listener = Arc::clone(listener);
                        tokio::spawn(async move { listener.on_new_head(number).await });
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(UpstreamError::ConnectionFailed(format!("WebSocket error: {e}")));
                }
            }
        }
        Ok(())
    }

    async fn run_polling(
        &self,
        dispatcher: &UpstreamDispatcher,
        interval: Duration,
        listener: Arc<dyn HeadListener>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last = None;

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {}
            }

            match dispatcher.head_block_number().await {
                Ok(number) if last.map_or(true, |last| number > last) => {
                    last = Some(number);
                    let listener = Arc::clone(&listener);
                    tokio::spawn(async move { listener.on_new_head(number).await });
                }
                Ok(_) => {}
                Err(e) => warn!(network = %self.network, error = %e, "head poll failed"),
            }
        }
    }
}

/// Extracts the block number of a `newHeads` notification. Subscription confirmations and
/// pending headers (`number: null`) yield `None`.
fn head_number(text: &str) -> Option<u64> {
    let message: Value = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!(error = %e, "ignoring unparsable subscription message");
            return None;
        }
    };
    let header = message.get("params")?.get("result")?;
    quantity_from_json(header.get("number")?)
}
