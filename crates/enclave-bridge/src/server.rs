//! Bridge server: accepts relay connections and feeds their requests to an
//! engine.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use enclave_core::OperationService;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::auth::AuthToken;
use crate::error::{BridgeError, BridgeResult};
use crate::frame::{BRIDGE_VERSION, Frame, read_frame, write_frame};

/// How long a new connection has to send its `hello`.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outgoing frames buffered per connection.
const OUTBOUND_CAPACITY: usize = 64;

/// Serves one engine to bridge clients.
///
/// Each connection gets its own task, and each request on a connection its
/// own task, so a `cancel` can reach work that is still running.
#[derive(Clone)]
pub struct BridgeServer {
    service: Arc<dyn OperationService>,
    root: String,
    token: Option<AuthToken>,
    handshake_timeout: Duration,
}

impl std::fmt::Debug for BridgeServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeServer")
            .field("root", &self.root)
            .field("has_token", &self.token.is_some())
            .field("handshake_timeout", &self.handshake_timeout)
            .finish_non_exhaustive()
    }
}

impl BridgeServer {
    /// Serve `service`, announcing `root` in the handshake.
    #[must_use]
    pub fn new(service: Arc<dyn OperationService>, root: impl Into<String>) -> Self {
        Self {
            service,
            root: root.into(),
            token: None,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Require this token. Without one, only loopback peers are accepted.
    #[must_use]
    pub fn with_token(mut self, token: Option<AuthToken>) -> Self {
        self.token = token;
        self
    }

    /// Override the handshake deadline.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Accept connections until `shutdown` flips to `true` or its sender is
    /// dropped. Open connections and their in-flight requests are dropped on
    /// shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listener's local address is unavailable;
    /// per-connection failures are logged.
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> BridgeResult<()> {
        let addr = listener.local_addr()?;
        info!(%addr, root = %self.root, "Bridge server listening");

        let mut connections = JoinSet::new();
        loop {
            while connections.try_join_next().is_some() {}

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let server = self.clone();
                        connections.spawn(async move {
                            match server.handle_connection(stream, peer).await {
                                Ok(()) => debug!(%peer, "Bridge connection closed"),
                                Err(e) => warn!(%peer, error = %e, "Bridge connection ended"),
                            }
                        });
                    },
                    Err(e) => warn!(error = %e, "Bridge accept failed"),
                },
                _ = shutdown.wait_for(|&stop| stop) => {
                    info!(%addr, connections = connections.len(), "Bridge server shutting down");
                    break;
                },
            }
        }
        connections.shutdown().await;
        Ok(())
    }

    fn authenticate(&self, peer: SocketAddr, presented: Option<&str>) -> Result<(), &'static str> {
        match &self.token {
            Some(token) if token.verify(presented) => Ok(()),
            Some(_) => Err("invalid token"),
            None if peer.ip().is_loopback() => Ok(()),
            None => Err("a token is required for non-loopback peers"),
        }
    }

    /// Run one connection: handshake, then requests until the peer leaves.
    async fn handle_connection(self, stream: TcpStream, peer: SocketAddr) -> BridgeResult<()> {
        stream.set_nodelay(true)?;
        let (mut reader, mut writer) = stream.into_split();

        let hello = tokio::time::timeout(self.handshake_timeout, read_frame(&mut reader))
            .await
            .map_err(|_| BridgeError::Protocol("no hello before the handshake deadline".into()))??;
        let presented = match hello {
            Some(Frame::Hello { token, version }) if version == BRIDGE_VERSION => token,
            Some(Frame::Hello { version, .. }) => {
                let reason = format!("unsupported bridge version {version}");
                write_frame(&mut writer, &Frame::Reject { reason: reason.clone() }).await?;
                return Err(BridgeError::Rejected(reason));
            },
            Some(other) => {
                return Err(BridgeError::Protocol(format!(
                    "expected hello, got {other:?}"
                )));
            },
            None => return Ok(()),
        };

        if let Err(reason) = self.authenticate(peer, presented.as_deref()) {
            warn!(%peer, reason, "Rejected bridge client");
            write_frame(
                &mut writer,
                &Frame::Reject {
                    reason: reason.to_string(),
                },
            )
            .await?;
            return Err(BridgeError::Rejected(reason.to_string()));
        }

        write_frame(
            &mut writer,
            &Frame::Welcome {
                root: self.root.clone(),
                version: BRIDGE_VERSION,
            },
        )
        .await?;
        info!(%peer, "Bridge client connected");

        let (tx, mut rx) = mpsc::channel::<Frame>(OUTBOUND_CAPACITY);
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    debug!(error = %e, "Bridge write failed");
                    break;
                }
            }
        });

        let mut requests = JoinSet::new();
        let result = loop {
            while requests.try_join_next().is_some() {}

            match read_frame(&mut reader).await {
                Ok(Some(Frame::Request { request })) => {
                    debug!(%peer, id = %request.id, op = request.operation.name(), "Bridge request");
                    let service = Arc::clone(&self.service);
                    let tx = tx.clone();
                    requests.spawn(async move {
                        let response = service.handle(request).await;
                        let _ = tx.send(Frame::Response { response }).await;
                    });
                },
                Ok(Some(Frame::Ping { nonce })) => {
                    if tx.send(Frame::Pong { nonce }).await.is_err() {
                        break Ok(());
                    }
                },
                Ok(Some(Frame::Pong { .. })) => {},
                Ok(Some(other)) => {
                    break Err(BridgeError::Protocol(format!(
                        "unexpected frame after handshake: {other:?}"
                    )));
                },
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        // Work for a peer that is gone has nobody to answer to.
        requests.abort_all();
        drop(tx);
        let _ = writer_task.await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use enclave_core::{Operation, OperationRequest, OperationResponse};
    use tokio::io::AsyncWriteExt;

    struct Echo;

    #[async_trait]
    impl OperationService for Echo {
        async fn handle(&self, request: OperationRequest) -> OperationResponse {
            OperationResponse::completed(request.id, request.operation.name())
        }
    }

    async fn start(token: Option<AuthToken>) -> (SocketAddr, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, shutdown) = watch::channel(false);
        let server = BridgeServer::new(Arc::new(Echo), "/srv/project").with_token(token);
        tokio::spawn(async move { server.serve(listener, shutdown).await });
        (addr, stop)
    }

    async fn hello(addr: SocketAddr, token: Option<&str>) -> (TcpStream, Frame) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(
            &mut stream,
            &Frame::Hello {
                token: token.map(String::from),
                version: BRIDGE_VERSION,
            },
        )
        .await
        .unwrap();
        let reply = read_frame(&mut stream).await.unwrap().unwrap();
        (stream, reply)
    }

    #[tokio::test]
    async fn test_loopback_without_token() {
        let (addr, _stop) = start(None).await;
        let (mut stream, reply) = hello(addr, None).await;
        assert_eq!(
            reply,
            Frame::Welcome {
                root: "/srv/project".into(),
                version: BRIDGE_VERSION
            }
        );

        write_frame(
            &mut stream,
            &Frame::Request {
                request: OperationRequest::with_id("a", Operation::Ping),
            },
        )
        .await
        .unwrap();
        let Some(Frame::Response { response }) = read_frame(&mut stream).await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.id.as_str(), "a");
        assert_eq!(response.output(), Some("ping"));
    }

    #[tokio::test]
    async fn test_wrong_token_rejected() {
        let (addr, _stop) = start(AuthToken::new("right")).await;
        let (mut stream, reply) = hello(addr, Some("wrong")).await;
        assert_eq!(
            reply,
            Frame::Reject {
                reason: "invalid token".into()
            }
        );
        assert!(read_frame(&mut stream).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ping_answered() {
        let (addr, _stop) = start(AuthToken::new("right")).await;
        let (mut stream, reply) = hello(addr, Some("right")).await;
        assert!(matches!(reply, Frame::Welcome { .. }));
        write_frame(&mut stream, &Frame::Ping { nonce: 42 }).await.unwrap();
        assert_eq!(
            read_frame(&mut stream).await.unwrap(),
            Some(Frame::Pong { nonce: 42 })
        );
    }

    #[tokio::test]
    async fn test_request_before_hello_closes() {
        let (addr, _stop) = start(None).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, &Frame::Ping { nonce: 1 }).await.unwrap();
        stream.flush().await.unwrap();
        assert!(read_frame(&mut stream).await.unwrap().is_none());
    }
}
