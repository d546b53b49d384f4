use crate::credentials::CredentialStore;
use crate::error::ConnectionError;
use configuration::ChannelConfig;
use events::LiveFeed;
use futures_util::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use url::Url;

/// Delay between an unexpected close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Where the push channel currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started, or stopped on request.
    Disconnected,
    Connecting,
    Connected,
    /// The channel dropped; a reconnect is scheduled.
    Dropped,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Owns the single push channel to the backend and keeps it alive.
///
/// All socket I/O happens on one background task owned by this manager, so there is never
/// more than one open channel. Frames are written into the shared `LiveFeed`.
pub struct ConnectionManager {
    url: Url,
    reconnect_delay: Duration,
    credentials: CredentialStore,
    feed: Arc<LiveFeed>,
    state: Arc<watch::Sender<ConnectionState>>,
    channel: Option<ChannelTask>,
}

struct ChannelTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ConnectionManager {
    pub fn new(
        url: &str,
        credentials: CredentialStore,
        feed: Arc<LiveFeed>,
    ) -> Result<Self, ConnectionError> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Ok(Self {
            url: Url::parse(url)?,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            credentials,
            feed,
            state: Arc::new(state),
            channel: None,
        })
    }

    pub fn from_config(
        config: &ChannelConfig,
        credentials: CredentialStore,
        feed: Arc<LiveFeed>,
    ) -> Result<Self, ConnectionError> {
        Ok(Self::new(&config.url, credentials, feed)?.with_reconnect_delay(config.reconnect_delay()))
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Starts the channel in the background.
    ///
    /// Fails without changing state if there is no access token. Calling this while the
    /// channel is already running does nothing.
    pub fn start(&mut self) -> Result<(), ConnectionError> {
        if let Some(channel) = &self.channel {
            if !channel.handle.is_finished() {
                tracing::debug!("[WS] Push channel already running.");
                return Ok(());
            }
        }
        if self.credentials.access_token().is_none() {
            return Err(ConnectionError::MissingCredential);
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let worker = ChannelWorker {
            url: self.url.clone(),
            reconnect_delay: self.reconnect_delay,
            credentials: self.credentials.clone(),
            feed: Arc::clone(&self.feed),
            state: Arc::clone(&self.state),
        };
        let handle = tokio::spawn(worker.run(shutdown_rx));
        self.channel = Some(ChannelTask { shutdown, handle });
        Ok(())
    }

    /// Closes the channel and cancels any pending reconnect.
    ///
    /// Returns once the background task has exited, so no connection attempt can follow.
    pub async fn stop(&mut self) {
        if let Some(channel) = self.channel.take() {
            // The task may already be gone, in which case there is no receiver.
            let _ = channel.shutdown.send(true);
            if let Err(e) = channel.handle.await {
                tracing::error!(error = %e, "[WS] Push channel task failed.");
            }
            tracing::info!("[WS] Push channel stopped.");
        }
        self.state.send_replace(ConnectionState::Disconnected);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Observes state changes, e.g. to drive a "live" indicator.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn feed(&self) -> &Arc<LiveFeed> {
        &self.feed
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.take() {
            let _ = channel.shutdown.send(true);
            channel.handle.abort();
        }
    }
}

/// How a connected session ended.
enum ChannelExit {
    Stopped,
    Dropped,
}

/// The state owned by the background task.
struct ChannelWorker {
    url: Url,
    reconnect_delay: Duration,
    credentials: CredentialStore,
    feed: Arc<LiveFeed>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl ChannelWorker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            // Re-read on every attempt so a refreshed token is picked up.
            let Some(token) = self.credentials.access_token() else {
                tracing::warn!("[WS] No access token available. Push channel will not reconnect.");
                break;
            };

            self.set_state(ConnectionState::Connecting);
            tracing::info!(url = %self.url, "[WS] Connecting to push channel...");

            let target = channel_url(&self.url, &token);
            let attempt = tokio::select! {
                result = connect_async(target.as_str()) => result,
                _ = shutdown.changed() => break,
            };

            match attempt {
                Ok((stream, _)) => {
                    self.set_state(ConnectionState::Connected);
                    tracing::info!("[WS] Connection established.");
                    if let ChannelExit::Stopped = self.pump(stream, &mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "[WS] Connection error.");
                }
            }

            self.set_state(ConnectionState::Dropped);
            tracing::warn!(
                "[WS] Disconnected. Reconnecting in {}s...",
                self.reconnect_delay.as_secs_f32()
            );

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.set_state(ConnectionState::Disconnected);
    }

    /// Forwards frames into the feed until the channel drops or a stop is requested.
    async fn pump(&self, mut stream: WsStream, shutdown: &mut watch::Receiver<bool>) -> ChannelExit {
        loop {
            tokio::select! {
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !self.feed.ingest(text.as_str()) {
                            tracing::debug!("[WS] Dropped malformed frame.");
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!("[WS] Ignoring binary frame of {} bytes.", data.len());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!("[WS] Connection closed by server: {:?}", frame);
                        return ChannelExit::Dropped;
                    }
                    // Pings are answered by tungstenite itself.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "[WS] Message error.");
                        return ChannelExit::Dropped;
                    }
                    None => return ChannelExit::Dropped,
                },
                _ = shutdown.changed() => {
                    if let Err(e) = stream.close(None).await {
                        tracing::debug!(error = %e, "[WS] Close handshake failed.");
                    }
                    return ChannelExit::Stopped;
                }
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }
}

/// The channel URL with the access token attached as the `token` query parameter.
fn channel_url(base: &Url, token: &str) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut().append_pair("token", token);
    url
}
