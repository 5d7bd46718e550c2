//! The seam between front ends and whatever executes operations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::operation::OperationRequest;
use crate::response::OperationResponse;

/// Something that turns requests into responses.
///
/// Implemented by the local engine and by the remote bridge relay, so a front
/// end does not know or care where operations actually run.
#[async_trait]
pub trait OperationService: Send + Sync {
    /// Handle a single request. Never panics on bad input; failures are
    /// reported through the response outcome.
    async fn handle(&self, request: OperationRequest) -> OperationResponse;
}

#[async_trait]
impl<T: OperationService + ?Sized> OperationService for Arc<T> {
    async fn handle(&self, request: OperationRequest) -> OperationResponse {
        (**self).handle(request).await
    }
}
