//! Trigger server: the sending half of element events.
//!
//! Clients connect to `ws://host:port/.../<group>` and join the group named
//! by the last path segment. [`TriggerServer::trigger`] sends a payload
//! verbatim to every member of a group; on the client side the message
//! router turns it into element events.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │              TriggerServer               │
//! │               (one port)                 │
//! │  ┌──────────────────────────────────┐    │
//! │  │ "feed"   → member#1, member#4    │    │
//! │  │ "alerts" → member#2              │    │
//! │  └──────────────────────────────────┘    │
//! └──────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let server = TriggerServer::bind(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).await?;
//!
//! // Page element: ws-events-connect="/live/feed"
//! server.trigger("feed", r#"{"refresh":null,"toast":"Saved"}"#);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, SocketAddr};
use std::result::Result as StdResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::MemberId;

// ============================================================================
// Constants
// ============================================================================

/// How often the accept loop checks the shutdown flag.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

// ============================================================================
// Types
// ============================================================================

/// Outbound channels of one group's members.
type Members = FxHashMap<MemberId, mpsc::UnboundedSender<String>>;

// ============================================================================
// TriggerServer
// ============================================================================

/// WebSocket server broadcasting payloads to named groups.
pub struct TriggerServer {
    /// Bound address.
    addr: SocketAddr,
    /// Members by group name.
    groups: RwLock<FxHashMap<String, Members>>,
    /// Shutdown flag.
    shutdown: AtomicBool,
}

// ============================================================================
// TriggerServer - Constructor
// ============================================================================

impl TriggerServer {
    /// Binds the server and starts the accept loop.
    ///
    /// Use port 0 to let the OS assign a port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if binding fails.
    pub async fn bind(ip: IpAddr, port: u16) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
        let addr = listener.local_addr()?;

        let server = Arc::new(Self {
            addr,
            groups: RwLock::new(FxHashMap::default()),
            shutdown: AtomicBool::new(false),
        });

        let accept = Arc::clone(&server);
        tokio::spawn(async move {
            accept.accept_loop(listener).await;
        });

        info!(%addr, "Trigger server started");
        Ok(server)
    }
}

// ============================================================================
// TriggerServer - Public API
// ============================================================================

impl TriggerServer {
    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is bound to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Returns the URL a client uses to join `group`.
    #[must_use]
    pub fn ws_url(&self, group: &str) -> String {
        format!("ws://{}/{group}", self.addr)
    }

    /// Sends `events` as one text frame to every member of `group`.
    ///
    /// Returns the number of members the payload was queued for. A group
    /// nobody has joined is not an error.
    pub fn trigger(&self, group: &str, events: &str) -> usize {
        let groups = self.groups.read();
        let Some(members) = groups.get(group) else {
            debug!(group, "Trigger for group without members");
            return 0;
        };

        let delivered = members
            .values()
            .filter(|tx| tx.send(events.to_owned()).is_ok())
            .count();

        debug!(group, delivered, "Triggered");
        delivered
    }

    /// Returns the number of members in `group`.
    #[must_use]
    pub fn member_count(&self, group: &str) -> usize {
        self.groups.read().get(group).map_or(0, |members| members.len())
    }

    /// Returns the number of groups with at least one member.
    #[inline]
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.read().len()
    }

    /// Stops accepting and closes every member connection.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);

        // Dropping the senders ends each member task
        let groups: Vec<_> = self.groups.write().drain().collect();
        let members: usize = groups.iter().map(|(_, members)| members.len()).sum();

        info!(members, "Trigger server shut down");
    }
}

// ============================================================================
// TriggerServer - Membership
// ============================================================================

impl TriggerServer {
    fn join(&self, group: &str, member: MemberId, tx: mpsc::UnboundedSender<String>) {
        self.groups
            .write()
            .entry(group.to_owned())
            .or_default()
            .insert(member, tx);
    }

    fn leave(&self, group: &str, member: MemberId) {
        let mut groups = self.groups.write();
        if let Some(members) = groups.get_mut(group) {
            members.remove(&member);
            if members.is_empty() {
                groups.remove(group);
            }
        }
    }
}

// ============================================================================
// TriggerServer - Accept Loop
// ============================================================================

impl TriggerServer {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        while !self.shutdown.load(Ordering::SeqCst) {
            match timeout(ACCEPT_POLL, listener.accept()).await {
                Ok(Ok((stream, addr))) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Ok(Err(e)) => error!(error = %e, "Accept failed"),
                Err(_) => continue,
            }
        }

        debug!("Accept loop terminated");
    }

    /// Upgrades one connection, joins its group and pumps triggers to it.
    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        let mut group = None;
        let callback =
            |request: &Request, response: Response| -> StdResult<Response, ErrorResponse> {
                match group_from_path(request.uri().path()) {
                    Some(name) => {
                        group = Some(name.to_owned());
                        Ok(response)
                    }
                    None => {
                        let mut rejection = ErrorResponse::new(Some("missing group".to_owned()));
                        *rejection.status_mut() = StatusCode::NOT_FOUND;
                        Err(rejection)
                    }
                }
            };

        let ws_stream = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

        let group = group.ok_or_else(|| Error::connection("upgrade completed without a group"))?;

        let member = MemberId::next();
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.join(&group, member, tx);
        info!(%member, group, ?addr, "Member joined");

        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                outgoing = rx.recv() => match outgoing {
                    Some(text) => {
                        if let Err(e) = ws_write.send(Message::text(text)).await {
                            debug!(%member, error = %e, "Send failed");
                            break;
                        }
                    }
                    None => break,
                },

                incoming = ws_read.next() => match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(%member, error = %e, "Member connection failed");
                        break;
                    }
                    // Inbound traffic carries nothing for the server
                    Some(Ok(_)) => trace!(%member, "Ignoring inbound frame"),
                },
            }
        }

        // Completes the handshake the peer started, or starts ours
        let _ = ws_write.close().await;

        self.leave(&group, member);
        info!(%member, group, "Member left");
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns the group named by a request path: its last non-empty segment.
#[must_use]
pub fn group_from_path(path: &str) -> Option<&str> {
    path.split('/').rev().find(|segment| !segment.is_empty())
}

// ============================================================================
// Tests
// ============================================================================
