//! Relay client: an [`OperationService`] that forwards every request over one
//! bridge connection.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use enclave_core::{EngineError, OperationRequest, OperationResponse, OperationService, RequestId};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::AuthToken;
use crate::error::{BridgeError, BridgeResult};
use crate::frame::{BRIDGE_VERSION, Frame, read_frame, write_frame};

/// Outgoing frames buffered before senders wait.
const OUTBOUND_CAPACITY: usize = 64;

/// Consecutive unanswered heartbeats before the link is declared dead.
const MAX_MISSED_HEARTBEATS: u32 = 2;

/// How to reach and authenticate with a bridge server.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Token presented in the handshake.
    pub token: Option<AuthToken>,
    /// Deadline for the TCP connect and for the handshake reply.
    pub connect_timeout: Duration,
    /// Interval between heartbeat pings.
    pub heartbeat: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            token: None,
            connect_timeout: Duration::from_secs(10),
            heartbeat: Duration::from_secs(15),
        }
    }
}

impl ClientOptions {
    /// Present this token.
    #[must_use]
    pub fn with_token(mut self, token: Option<AuthToken>) -> Self {
        self.token = token;
        self
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }

    /// Set the connect and handshake deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// State shared with the background tasks.
struct Shared {
    pending: DashMap<RequestId, oneshot::Sender<OperationResponse>>,
    /// `None` while connected, the reason once disconnected.
    link: watch::Sender<Option<String>>,
    last_pong: AtomicU64,
}

impl Shared {
    fn disconnect_reason(&self) -> Option<String> {
        self.link.borrow().clone()
    }

    /// Mark the link dead and fail everything waiting on it.
    fn disconnect(&self, reason: &str) {
        let first = self.link.send_if_modified(|link| {
            if link.is_some() {
                return false;
            }
            *link = Some(reason.to_string());
            true
        });
        if first {
            warn!(reason, "Bridge link lost");
        }

        let ids: Vec<RequestId> = self.pending.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Some((id, tx)) = self.pending.remove(&id) {
                let _ = tx.send(disconnected(id, reason));
            }
        }
    }
}

fn disconnected(id: RequestId, reason: &str) -> OperationResponse {
    OperationResponse::failed(
        id,
        &EngineError::BridgeDisconnected {
            reason: reason.to_string(),
        },
    )
}

/// Aborts the background tasks when the last client handle goes away.
struct Tasks(Vec<JoinHandle<()>>);

impl Tasks {
    fn abort(&self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

impl Drop for Tasks {
    fn drop(&mut self) {
        self.abort();
    }
}

/// A connected relay client. Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct BridgeClient {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Frame>,
    root: Arc<str>,
    tasks: Arc<Tasks>,
}

impl std::fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeClient")
            .field("root", &self.root)
            .field("pending", &self.shared.pending.len())
            .field("disconnected", &self.shared.disconnect_reason())
            .finish_non_exhaustive()
    }
}

impl BridgeClient {
    /// Connect and complete the handshake.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::Disconnected`] if the connect or handshake times out
    ///   or the server closes before answering
    /// - [`BridgeError::Rejected`] if the server refuses the token
    /// - [`BridgeError::Io`] for socket errors
    pub async fn connect(addr: SocketAddr, options: ClientOptions) -> BridgeResult<Self> {
        let stream = tokio::time::timeout(options.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| BridgeError::Disconnected(format!("connect to {addr} timed out")))??;
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = stream.into_split();

        write_frame(
            &mut writer,
            &Frame::Hello {
                token: options.token.as_ref().map(|t| t.expose().to_string()),
                version: BRIDGE_VERSION,
            },
        )
        .await?;

        let reply = tokio::time::timeout(options.connect_timeout, read_frame(&mut reader))
            .await
            .map_err(|_| BridgeError::Disconnected("handshake timed out".into()))??;
        let root = match reply {
            Some(Frame::Welcome { root, .. }) => root,
            Some(Frame::Reject { reason }) => return Err(BridgeError::Rejected(reason)),
            Some(other) => {
                return Err(BridgeError::Protocol(format!(
                    "expected welcome, got {other:?}"
                )));
            },
            None => {
                return Err(BridgeError::Disconnected(
                    "server closed during handshake".into(),
                ));
            },
        };
        info!(%addr, %root, "Bridge client connected");

        let (link, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            pending: DashMap::new(),
            link,
            last_pong: AtomicU64::new(0),
        });
        let (outbound, mut rx) = mpsc::channel::<Frame>(OUTBOUND_CAPACITY);

        let writer_shared = Arc::clone(&shared);
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    writer_shared.disconnect(&format!("write failed: {e}"));
                    break;
                }
            }
        });

        let reader_task = tokio::spawn(read_loop(reader, Arc::clone(&shared)));
        let heartbeat_task = tokio::spawn(heartbeat_loop(
            outbound.clone(),
            Arc::clone(&shared),
            options.heartbeat,
        ));

        Ok(Self {
            shared,
            outbound,
            root: root.into(),
            tasks: Arc::new(Tasks(vec![writer_task, reader_task, heartbeat_task])),
        })
    }

    /// Project root reported by the server.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Whether the link is still up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.disconnect_reason().is_none()
    }

    /// Wait until the link drops and return why.
    pub async fn closed(&self) -> String {
        let mut rx = self.shared.link.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(reason) => reason.clone().unwrap_or_default(),
            Err(_) => "client dropped".to_string(),
        }
    }

    /// Number of requests awaiting a response.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.shared.pending.len()
    }

    /// Drop the connection for every clone, failing pending requests with
    /// `reason`.
    pub fn close(&self, reason: &str) {
        self.shared.disconnect(reason);
        self.tasks.abort();
    }
}

async fn read_loop(mut reader: OwnedReadHalf, shared: Arc<Shared>) {
    let reason = loop {
        match read_frame(&mut reader).await {
            Ok(Some(Frame::Response { response })) => {
                match shared.pending.remove(&response.id) {
                    Some((_, tx)) => {
                        let _ = tx.send(response);
                    },
                    None => debug!(id = %response.id, "Response for unknown request"),
                }
            },
            Ok(Some(Frame::Pong { nonce })) => {
                shared.last_pong.fetch_max(nonce, Ordering::Relaxed);
            },
            Ok(Some(Frame::Ping { .. })) => {},
            Ok(Some(other)) => break format!("unexpected frame: {other:?}"),
            Ok(None) => break "connection closed by server".to_string(),
            Err(e) => break e.to_string(),
        }
    };
    shared.disconnect(&reason);
}

async fn heartbeat_loop(outbound: mpsc::Sender<Frame>, shared: Arc<Shared>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut sent: u64 = 0;
    let mut missed: u32 = 0;
    loop {
        ticker.tick().await;
        if shared.disconnect_reason().is_some() {
            return;
        }
        if sent > 0 && shared.last_pong.load(Ordering::Relaxed) < sent {
            missed = missed.saturating_add(1);
            if missed >= MAX_MISSED_HEARTBEATS {
                shared.disconnect("heartbeat timed out");
                return;
            }
        } else {
            missed = 0;
        }
        sent = sent.saturating_add(1);
        if outbound.send(Frame::Ping { nonce: sent }).await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl OperationService for BridgeClient {
    async fn handle(&self, request: OperationRequest) -> OperationResponse {
        let id = request.id.clone();
        if let Some(reason) = self.shared.disconnect_reason() {
            return disconnected(id, &reason);
        }

        let (tx, rx) = oneshot::channel();
        match self.shared.pending.entry(id.clone()) {
            Entry::Occupied(_) => {
                return OperationResponse::failed(
                    id,
                    &EngineError::invalid("a request with this id is already in flight"),
                );
            },
            Entry::Vacant(slot) => {
                slot.insert(tx);
            },
        }

        // The link may have dropped between the first check and the insert.
        if let Some(reason) = self.shared.disconnect_reason() {
            self.shared.pending.remove(&id);
            return disconnected(id, &reason);
        }

        if self.outbound.send(Frame::Request { request }).await.is_err() {
            self.shared.pending.remove(&id);
            return disconnected(id, "connection closed");
        }

        match rx.await {
            Ok(response) => response,
            Err(_) => {
                let reason = self
                    .shared
                    .disconnect_reason()
                    .unwrap_or_else(|| "connection closed".to_string());
                disconnected(id, &reason)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::BridgeServer;
    use enclave_core::{ErrorKind, Operation};
    use tokio::net::TcpListener;

    struct Slow;

    #[async_trait]
    impl OperationService for Slow {
        async fn handle(&self, request: OperationRequest) -> OperationResponse {
            if matches!(request.operation, Operation::Describe) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            OperationResponse::completed(request.id, request.operation.name())
        }
    }

    async fn serve(token: Option<AuthToken>) -> (SocketAddr, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, shutdown) = watch::channel(false);
        let server = BridgeServer::new(Arc::new(Slow), "/remote/root").with_token(token);
        tokio::spawn(async move { server.serve(listener, shutdown).await });
        (addr, stop)
    }

    #[tokio::test]
    async fn test_requests_correlate() {
        let (addr, _stop) = serve(None).await;
        let client = BridgeClient::connect(addr, ClientOptions::default())
            .await
            .unwrap();
        assert_eq!(client.root(), "/remote/root");

        let (a, b) = tokio::join!(
            client.handle(OperationRequest::with_id("a", Operation::Ping)),
            client.handle(OperationRequest::with_id("b", Operation::Ping)),
        );
        assert_eq!(a.id.as_str(), "a");
        assert_eq!(b.id.as_str(), "b");
        assert_eq!(client.pending(), 0);
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let (addr, _stop) = serve(AuthToken::new("right")).await;
        let options = ClientOptions::default().with_token(AuthToken::new("wrong"));
        let err = BridgeClient::connect(addr, options).await.unwrap_err();
        assert!(matches!(err, BridgeError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_pending_fail_when_server_vanishes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server_task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _hello = read_frame(&mut stream).await.unwrap();
            write_frame(
                &mut stream,
                &Frame::Welcome {
                    root: "/r".into(),
                    version: BRIDGE_VERSION,
                },
            )
            .await
            .unwrap();
            let _request = read_frame(&mut stream).await.unwrap();
        });

        let client = BridgeClient::connect(addr, ClientOptions::default())
            .await
            .unwrap();
        let response = client
            .handle(OperationRequest::with_id("x", Operation::Describe))
            .await;
        assert_eq!(
            response.error().map(|e| e.kind),
            Some(ErrorKind::BridgeDisconnected)
        );
        server_task.await.unwrap();

        assert!(!client.is_connected());
        let later = client
            .handle(OperationRequest::with_id("y", Operation::Ping))
            .await;
        assert_eq!(
            later.error().map(|e| e.kind),
            Some(ErrorKind::BridgeDisconnected)
        );
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let (addr, _stop) = serve(None).await;
        let client = BridgeClient::connect(addr, ClientOptions::default())
            .await
            .unwrap();
        let slow = client.clone();
        let first = tokio::spawn(async move {
            slow.handle(OperationRequest::with_id("dup", Operation::Describe))
                .await
        });
        while client.pending() == 0 {
            tokio::task::yield_now().await;
        }
        let second = client
            .handle(OperationRequest::with_id("dup", Operation::Ping))
            .await;
        assert_eq!(
            second.error().map(|e| e.kind),
            Some(ErrorKind::InvalidRequest)
        );
        first.abort();
    }

    #[tokio::test]
    async fn test_silent_server_trips_heartbeat() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _hello = read_frame(&mut stream).await.unwrap();
            write_frame(
                &mut stream,
                &Frame::Welcome {
                    root: "/r".into(),
                    version: BRIDGE_VERSION,
                },
            )
            .await
            .unwrap();
            // Read and ignore everything, never answering.
            while let Ok(Some(_)) = read_frame(&mut stream).await {}
        });

        let options = ClientOptions::default().with_heartbeat(Duration::from_millis(50));
        let client = BridgeClient::connect(addr, options).await.unwrap();
        let reason = tokio::time::timeout(Duration::from_secs(5), client.closed())
            .await
            .unwrap();
        assert_eq!(reason, "heartbeat timed out");
    }
}
