//! Mock implementations for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use enclave_core::{EngineError, OperationRequest, OperationResponse, OperationService};

/// An [`OperationService`] that answers from a script.
///
/// Queued replies are used in order; once the queue is empty every request
/// completes with its operation name. Every request is recorded.
#[derive(Debug, Clone, Default)]
pub struct ScriptedService {
    replies: Arc<Mutex<VecDeque<Result<String, EngineError>>>>,
    seen: Arc<Mutex<Vec<OperationRequest>>>,
    delay: Option<Duration>,
}

impl ScriptedService {
    /// Create a service with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    #[must_use]
    pub fn with_output(self, output: impl Into<String>) -> Self {
        self.push(Ok(output.into()));
        self
    }

    /// Queue a failure.
    #[must_use]
    pub fn with_error(self, error: EngineError) -> Self {
        self.push(Err(error));
        self
    }

    /// Sleep this long before answering each request.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<OperationRequest> {
        self.seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }

    fn push(&self, reply: Result<String, EngineError>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }
}

#[async_trait]
impl OperationService for ScriptedService {
    async fn handle(&self, request: OperationRequest) -> OperationResponse {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.replies.lock().ok().and_then(|mut r| r.pop_front());
        match reply {
            Some(Ok(output)) => OperationResponse::completed(request.id, output),
            Some(Err(error)) => OperationResponse::failed(request.id, &error),
            None => OperationResponse::completed(request.id, request.operation.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::{ErrorKind, Operation};

    #[tokio::test]
    async fn test_script_then_default() {
        let service = ScriptedService::new()
            .with_output("first")
            .with_error(EngineError::Busy {
                resource: "a.txt".into(),
            });

        let a = service.handle(OperationRequest::new(Operation::Ping)).await;
        let b = service.handle(OperationRequest::new(Operation::Ping)).await;
        let c = service.handle(OperationRequest::new(Operation::Describe)).await;

        assert_eq!(a.output(), Some("first"));
        assert_eq!(b.error().map(|e| e.kind), Some(ErrorKind::Busy));
        assert_eq!(c.output(), Some("describe"));
        assert_eq!(service.requests().len(), 3);
    }
}
