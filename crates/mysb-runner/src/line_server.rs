//! TCP line transport.
//!
//! A bus adapter (for example a small MQTT bridge script) connects over TCP.
//! The server first sends one `SUB <pattern>` line per subscription topic.
//! After that the adapter forwards each bus message as `<topic> <payload>`
//! and the server writes every reply back in the same form. The payload is
//! everything after the first space and may be empty.
//!
//! Each inbound line is handled on the blocking pool. Messages about one node
//! go through that node's lane and are handled in arrival order, so a
//! bootloader command always lands before the config request sent after it.
//! Lanes run concurrently, so replies for different nodes may be reordered.
//!
//! When the client closes its write side, replies still being produced are
//! written out before the connection closes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use mysb_bridge::{Reply, Router};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Prefix of the subscription lines sent on connect.
pub const SUBSCRIBE_PREFIX: &str = "SUB";

/// Replies buffered per connection before handlers wait for the writer.
const REPLY_BUFFER: usize = 256;

/// Lane shared by messages that do not name a node.
const SHARED_LANE: &str = "";

/// An inbound `(topic, payload)` pair queued on a lane.
type Inbound = (String, String);

/// Split an inbound line into topic and payload.
///
/// Returns `None` for blank lines.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }
    Some(line.split_once(' ').unwrap_or((line, "")))
}

/// Render a reply as an outbound line.
pub fn format_reply(reply: &Reply) -> String {
    format!("{} {}\n", reply.topic, reply.payload)
}

/// Render a subscription line.
pub fn format_subscription(pattern: &str) -> String {
    format!("{} {}\n", SUBSCRIBE_PREFIX, pattern)
}

/// Serves a [`Router`] to line-protocol clients.
pub struct LineServer {
    router: Arc<Router>,
    listener: TcpListener,
    connected: Arc<AtomicUsize>,
}

impl LineServer {
    /// Bind to `addr`.
    pub async fn bind(addr: SocketAddr, router: Arc<Router>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(LineServer {
            router,
            listener,
            connected: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared count of connected clients.
    pub fn connected_clients(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.connected)
    }

    /// Accept connections until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
        info!(addr = %self.listener.local_addr()?, "Line transport listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted?;
                    let router = Arc::clone(&self.router);
                    let connected = Arc::clone(&self.connected);
                    let shutdown = shutdown.clone();

                    tokio::spawn(async move {
                        connected.fetch_add(1, Ordering::SeqCst);
                        info!(%peer, "Bus adapter connected");

                        if let Err(e) = handle_connection(stream, router, shutdown).await {
                            warn!(%peer, "Connection error: {}", e);
                        }

                        connected.fetch_sub(1, Ordering::SeqCst);
                        info!(%peer, "Bus adapter disconnected");
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Line transport shutting down");
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Serve one client until it disconnects or shutdown is requested.
async fn handle_connection(
    mut stream: TcpStream,
    router: Arc<Router>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.split();
    let mut lines = BufReader::new(reader).lines();
    let (reply_tx, mut reply_rx) = mpsc::channel::<Reply>(REPLY_BUFFER);
    let mut lanes: HashMap<String, mpsc::UnboundedSender<Inbound>> = HashMap::new();

    for pattern in router.subscription_topics() {
        writer
            .write_all(format_subscription(&pattern).as_bytes())
            .await?;
    }
    writer.flush().await?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let Some((topic, payload)) = parse_line(&line) else {
                    continue;
                };
                debug!(topic, payload, "Inbound message");

                let key = lane_key(&router, topic);
                let lane = lanes
                    .entry(key)
                    .or_insert_with(|| spawn_lane(Arc::clone(&router), reply_tx.clone()));
                if lane.send((topic.to_string(), payload.to_string())).is_err() {
                    warn!(topic, "Lane closed, dropping message");
                }
            }

            Some(reply) = reply_rx.recv() => {
                writer.write_all(format_reply(&reply).as_bytes()).await?;
                writer.flush().await?;
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }

    // Closing the lanes lets each finish its queue; the channel ends once the
    // last lane drops its sender.
    drop(lanes);
    drop(reply_tx);
    while let Some(reply) = reply_rx.recv().await {
        writer.write_all(format_reply(&reply).as_bytes()).await?;
    }
    writer.flush().await
}

/// Lane a topic is queued on: its node id, or the shared lane.
fn lane_key(router: &Router, topic: &str) -> String {
    router
        .topics()
        .classify(topic)
        .ok()
        .and_then(|request| request.node_id().map(str::to_string))
        .unwrap_or_else(|| SHARED_LANE.to_string())
}

/// Start a task that handles one lane's messages in order.
fn spawn_lane(router: Arc<Router>, reply_tx: mpsc::Sender<Reply>) -> mpsc::UnboundedSender<Inbound> {
    let (lane_tx, mut lane_rx) = mpsc::unbounded_channel::<Inbound>();

    tokio::spawn(async move {
        while let Some((topic, payload)) = lane_rx.recv().await {
            let router = Arc::clone(&router);
            let handled =
                tokio::task::spawn_blocking(move || router.handle_inbound(&topic, &payload)).await;

            match handled {
                Ok(Some(reply)) => {
                    if reply_tx.send(reply).await.is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Handler task failed: {}", e),
            }
        }
    });

    lane_tx
}
