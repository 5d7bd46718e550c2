//! Per-request context for correlated spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Context for one handled operation request.
///
/// The request id is the protocol's own id, so log lines on both ends of a
/// bridge correlate without a separate correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// Protocol request id.
    pub request_id: String,
    /// Operation name (`read_file`, `confirm`, ...).
    pub operation: String,
    /// Component handling the request (`engine`, `bridge-server`, `relay`).
    pub source: String,
    /// Remote peer, when the request arrived over a bridge.
    pub peer: Option<String>,
    /// When handling started.
    pub started_at: DateTime<Utc>,
}

impl RequestContext {
    /// Create a context for a request.
    #[must_use]
    pub fn new(request_id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            operation: operation.into(),
            source: "engine".to_string(),
            peer: None,
            started_at: Utc::now(),
        }
    }

    /// Set the handling component.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Set the remote peer.
    #[must_use]
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    /// Milliseconds since the context was created.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
    }

    /// A span carrying the request id, operation, and source.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "request",
            request_id = %self.request_id,
            operation = %self.operation,
            source = %self.source,
            peer = self.peer.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let ctx = RequestContext::new("r1", "git")
            .with_source("bridge-server")
            .with_peer("127.0.0.1:5000");
        assert_eq!(ctx.request_id, "r1");
        assert_eq!(ctx.operation, "git");
        assert_eq!(ctx.source, "bridge-server");
        assert_eq!(ctx.peer.as_deref(), Some("127.0.0.1:5000"));
    }

    #[test]
    fn test_default_source() {
        assert_eq!(RequestContext::new("r", "ping").source, "engine");
    }

    #[test]
    fn test_elapsed() {
        let ctx = RequestContext::new("r", "ping");
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(ctx.elapsed_ms() >= 10);
    }

    #[test]
    fn test_serialization() {
        let ctx = RequestContext::new("r2", "read_file");
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"operation\":\"read_file\""));
        let parsed: RequestContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.request_id, "r2");
    }

    #[test]
    fn test_span_is_created() {
        let ctx = RequestContext::new("r3", "describe");
        let _entered = ctx.span().entered();
    }
}
