use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use civic_types::events::{ChannelCommand, ChannelEvent};

use crate::MessagingClient;
use crate::backoff::ReconnectPolicy;
use crate::dispatcher::{ConnectionState, Dispatcher};
use crate::error::GatewayError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Heartbeat interval: the client sends a Ping this often.
/// If 2 consecutive Pongs are missed, the connection is treated as lost.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    pub reconnect: ReconnectPolicy,
    pub heartbeat: Duration,
}

impl WsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::default(),
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }
}

/// Derive the socket URL from the REST base URL: same host and port,
/// `ws`/`wss` scheme, root path.
pub fn socket_url_from_api(api_url: &str) -> Result<String, GatewayError> {
    let mut url = url::Url::parse(api_url).map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(GatewayError::InvalidUrl(format!("unsupported scheme {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| GatewayError::InvalidUrl(api_url.to_string()))?;
    url.set_path("/");
    url.set_query(None);
    Ok(url.to_string())
}

/// What the server has been told about this client. Replayed after a
/// reconnect so the new socket ends up in the same rooms as the old one.
#[derive(Debug, Default)]
struct Presence {
    user_id: Option<String>,
    groups: BTreeSet<String>,
}

impl Presence {
    fn record(&mut self, cmd: &ChannelCommand) {
        match cmd {
            ChannelCommand::NewUserAdd(user_id) => self.user_id = Some(user_id.clone()),
            ChannelCommand::JoinGroup(chat_id) => {
                self.groups.insert(chat_id.clone());
            }
            ChannelCommand::SendGroupMessage(_) => {}
        }
    }

    fn replay(&self) -> Vec<ChannelCommand> {
        self.user_id
            .iter()
            .cloned()
            .map(ChannelCommand::NewUserAdd)
            .chain(self.groups.iter().cloned().map(ChannelCommand::JoinGroup))
            .collect()
    }
}

struct Connection {
    outbound: mpsc::UnboundedSender<ChannelCommand>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Real-time channel over a WebSocket carrying JSON event frames.
pub struct WsClient {
    config: WsConfig,
    dispatcher: Dispatcher,
    presence: Arc<Mutex<Presence>>,
    conn: tokio::sync::Mutex<Option<Connection>>,
}

impl WsClient {
    pub fn new(config: WsConfig) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::default(),
            presence: Arc::new(Mutex::new(Presence::default())),
            conn: tokio::sync::Mutex::new(None),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[async_trait]
impl MessagingClient for WsClient {
    async fn connect(&self) -> Result<(), GatewayError> {
        let mut conn = self.conn.lock().await;
        if let Some(existing) = conn.as_ref() {
            if !existing.task.is_finished() {
                return Ok(());
            }
        }

        self.dispatcher.set_state(ConnectionState::Connecting);
        let ws = match tokio_tungstenite::connect_async(self.config.url.as_str()).await {
            Ok((ws, _)) => ws,
            Err(e) => {
                self.dispatcher.set_state(ConnectionState::Disconnected);
                return Err(e.into());
            }
        };
        info!("Connected to real-time channel at {}", self.config.url);

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(drive(
            ws,
            self.config.clone(),
            self.dispatcher.clone(),
            self.presence.clone(),
            outbound_rx,
            shutdown_rx,
        ));

        *conn = Some(Connection {
            outbound,
            shutdown,
            task,
        });
        Ok(())
    }

    async fn send(&self, command: ChannelCommand) -> Result<(), GatewayError> {
        let conn = self.conn.lock().await;
        let conn = conn.as_ref().ok_or(GatewayError::NotConnected)?;

        self.presence
            .lock()
            .expect("presence lock poisoned")
            .record(&command);

        debug!("emit {}", command.name());
        conn.outbound.send(command).map_err(|_| GatewayError::Closed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.dispatcher.subscribe()
    }

    async fn disconnect(&self) -> Result<(), GatewayError> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };

        let _ = conn.shutdown.send(true);
        if let Err(e) = conn.task.await {
            warn!("Real-time channel task ended abnormally: {}", e);
        }

        *self.presence.lock().expect("presence lock poisoned") = Presence::default();
        self.dispatcher.set_state(ConnectionState::Disconnected);
        info!("Disconnected from real-time channel");
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.dispatcher.state()
    }

    fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.dispatcher.watch_state()
    }
}

enum SessionEnd {
    /// Caller asked to disconnect (or dropped the client)
    Shutdown,
    /// Socket died; carries a command that was dequeued but not delivered
    Lost(Option<ChannelCommand>),
}

/// Connection task: runs sessions back to back, reconnecting in between
/// until the policy gives up or shutdown is requested.
async fn drive(
    first: WsStream,
    config: WsConfig,
    dispatcher: Dispatcher,
    presence: Arc<Mutex<Presence>>,
    mut outbound: mpsc::UnboundedReceiver<ChannelCommand>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ws = first;
    let mut greeting = Vec::new();
    let mut attempt = 0;

    loop {
        dispatcher.set_state(ConnectionState::Connected);
        let started = Instant::now();

        let end = run_session(ws, greeting, &mut outbound, &mut shutdown, &dispatcher, config.heartbeat).await;
        let unsent = match end {
            SessionEnd::Shutdown => break,
            SessionEnd::Lost(unsent) => unsent,
        };

        // Only a session that stayed up resets the attempt count.
        if config.reconnect.is_stable(started.elapsed()) {
            attempt = 0;
        }
        ws = match reconnect(&config, &dispatcher, &mut shutdown, &mut attempt).await {
            Some(ws) => ws,
            None => break,
        };

        greeting = presence.lock().expect("presence lock poisoned").replay();
        greeting.extend(unsent);
    }

    dispatcher.set_state(ConnectionState::Disconnected);
}

async fn run_session(
    ws: WsStream,
    greeting: Vec<ChannelCommand>,
    outbound: &mut mpsc::UnboundedReceiver<ChannelCommand>,
    shutdown: &mut watch::Receiver<bool>,
    dispatcher: &Dispatcher,
    heartbeat_every: Duration,
) -> SessionEnd {
    let (mut sink, mut stream) = ws.split();

    for cmd in greeting {
        if let Err(e) = sink.send(encode(&cmd)).await {
            warn!("Re-announce on new socket failed: {}", e);
            return SessionEnd::Lost(Some(cmd));
        }
    }

    let mut heartbeat = tokio::time::interval(heartbeat_every);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_heartbeats: u8 = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = sink.send(Message::Close(None)).await;
                return SessionEnd::Shutdown;
            }
            cmd = outbound.recv() => {
                let Some(cmd) = cmd else {
                    return SessionEnd::Shutdown;
                };
                if let Err(e) = sink.send(encode(&cmd)).await {
                    warn!("Send of {} failed: {}", cmd.name(), e);
                    return SessionEnd::Lost(Some(cmd));
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ChannelEvent>(text.as_str()) {
                            Ok(event) => {
                                trace!("received {:?}", event);
                                dispatcher.publish(event);
                            }
                            Err(e) => {
                                let raw: String = text.as_str().chars().take(200).collect();
                                warn!("Ignoring unrecognised frame: {} -- raw: {}", e, raw);
                            }
                        }
                    }
                    Some(Ok(Message::Pong(_))) => pong_received = true,
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("Real-time channel closed by server");
                        return SessionEnd::Lost(None);
                    }
                    Some(Err(e)) => {
                        warn!("Real-time channel error: {}", e);
                        return SessionEnd::Lost(None);
                    }
                    Some(Ok(_)) => {}
                }
            }
            _ = heartbeat.tick() => {
                if pong_received {
                    missed_heartbeats = 0;
                } else {
                    missed_heartbeats += 1;
                    if missed_heartbeats >= 2 {
                        warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                        return SessionEnd::Lost(None);
                    }
                }
                pong_received = false;
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    return SessionEnd::Lost(None);
                }
            }
        }
    }
}

/// Back off and reconnect, continuing from `attempt`. Returns `None` when the
/// policy is exhausted or shutdown was requested while waiting.
async fn reconnect(
    config: &WsConfig,
    dispatcher: &Dispatcher,
    shutdown: &mut watch::Receiver<bool>,
    attempt: &mut u32,
) -> Option<WsStream> {
    loop {
        *attempt += 1;
        if !config.reconnect.allows(*attempt) {
            break;
        }
        dispatcher.set_state(ConnectionState::Reconnecting { attempt: *attempt });
        let delay = config.reconnect.delay(*attempt);
        debug!("Reconnect attempt {} in {:?}", attempt, delay);

        tokio::select! {
            _ = shutdown.changed() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        match tokio_tungstenite::connect_async(config.url.as_str()).await {
            Ok((ws, _)) => {
                info!("Reconnected to real-time channel on attempt {}", attempt);
                return Some(ws);
            }
            Err(e) => warn!("Reconnect attempt {} failed: {}", attempt, e),
        }
    }

    warn!("Giving up on real-time channel after {} attempt(s)", *attempt - 1);
    None
}

fn encode(cmd: &ChannelCommand) -> Message {
    // Serializing these enums cannot fail: every field is a string or a plain struct.
    let text = serde_json::to_string(cmd).unwrap_or_default();
    Message::Text(text.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_url_follows_api_scheme() {
        assert_eq!(
            socket_url_from_api("http://localhost:5000/api").unwrap(),
            "ws://localhost:5000/"
        );
        assert_eq!(
            socket_url_from_api("https://civic.example.org/v1?x=1").unwrap(),
            "wss://civic.example.org/"
        );
        assert!(socket_url_from_api("ftp://example.org").is_err());
    }

    #[test]
    fn presence_replays_user_then_groups() {
        let mut p = Presence::default();
        p.record(&ChannelCommand::JoinGroup("c2".into()));
        p.record(&ChannelCommand::NewUserAdd("u1".into()));
        p.record(&ChannelCommand::JoinGroup("c1".into()));
        p.record(&ChannelCommand::JoinGroup("c2".into()));

        assert_eq!(
            p.replay(),
            vec![
                ChannelCommand::NewUserAdd("u1".into()),
                ChannelCommand::JoinGroup("c1".into()),
                ChannelCommand::JoinGroup("c2".into()),
            ]
        );
    }

    #[tokio::test]
    async fn send_before_connect_is_refused() {
        let client = WsClient::new(WsConfig::new("ws://127.0.0.1:9/"));
        let err = client
            .send(ChannelCommand::JoinGroup("c1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotConnected));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
