//! The operation engine: validate, gate, preview or execute.

use async_trait::async_trait;
use enclave_approval::fingerprint;
use enclave_core::{
    ConfirmationTicket, EngineError, EngineResult, Operation, OperationRequest,
    OperationResponse, OperationService, PROTOCOL_VERSION, RequestId,
};
use enclave_policy::PolicySet;
use enclave_telemetry::RequestContext;
use enclave_workspace::PathGuard;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::catalog::catalog;
use crate::commands;
use crate::confirm;
use crate::context::SessionContext;
use crate::edits;
use crate::error::SetupError;
use crate::files;
use crate::limits::EngineLimits;
use crate::pending::{Preview, Step};

/// The local operation engine.
///
/// Cheap to clone; clones share one [`SessionContext`].
#[derive(Debug, Clone)]
pub struct Engine {
    ctx: Arc<SessionContext>,
}

/// Builder for [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    root: PathBuf,
    policy: Option<PolicySet>,
    limits: EngineLimits,
}

impl EngineBuilder {
    /// Start building an engine for `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: None,
            limits: EngineLimits::default(),
        }
    }

    /// Use these policy tables instead of the built-in ones.
    #[must_use]
    pub fn with_policy(mut self, policy: PolicySet) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Use these limits.
    #[must_use]
    pub fn with_limits(mut self, limits: EngineLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Canonicalize the root and assemble the session.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Root`] if the root is not an accessible
    /// directory, or [`SetupError::Policy`] if the built-in tables fail to
    /// load.
    pub fn build(self) -> Result<Engine, SetupError> {
        let guard = PathGuard::new(&self.root)?;
        let policy = match self.policy {
            Some(policy) => policy,
            None => PolicySet::builtin()?,
        };
        info!(root = %guard.root().display(), "Engine session started");
        Ok(Engine {
            ctx: Arc::new(SessionContext::new(guard, policy, self.limits)),
        })
    }
}

impl Engine {
    /// An engine for `root` with built-in policy and default limits.
    ///
    /// # Errors
    ///
    /// See [`EngineBuilder::build`].
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SetupError> {
        EngineBuilder::new(root).build()
    }

    /// Start a builder.
    #[must_use]
    pub fn builder(root: impl Into<PathBuf>) -> EngineBuilder {
        EngineBuilder::new(root)
    }

    /// The canonical project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.ctx.root()
    }

    /// The shared session context.
    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    async fn dispatch(
        &self,
        request: &OperationRequest,
        cancel: &CancellationToken,
    ) -> EngineResult<Step> {
        let ctx = &*self.ctx;
        let id = &request.id;
        match &request.operation {
            Operation::ReadFile {
                path,
                offset,
                limit,
            } => files::read_file(ctx, path, *offset, *limit).await.map(Step::Done),
            Operation::ListDirectory { path, max_depth } => files::list_directory(ctx, path, *max_depth)
                .await
                .map(Step::Done),
            Operation::ProjectStructure {
                max_depth,
                max_entries,
            } => files::project_structure(ctx, *max_depth, *max_entries)
                .await
                .map(Step::Done),
            Operation::CreateDirectory { path } => {
                files::create_directory(ctx, path).await.map(Step::Done)
            },
            Operation::WriteFile { path, content } => files::preview_write(ctx, path, content).await,
            Operation::DeletePath { path } => files::preview_delete(ctx, path).await,
            Operation::RunCommand {
                command,
                timeout_ms,
            } => commands::run_command(ctx, id, command, *timeout_ms, cancel).await,
            Operation::Git { command } => commands::git(ctx, id, command, cancel).await,
            Operation::SmartEdit { path, edit } => edits::preview_smart_edit(ctx, path, edit).await,
            Operation::InspectFile {
                path,
                function,
                pattern,
                regex,
            } => edits::inspect_file(ctx, path, function.as_deref(), pattern.as_deref(), *regex)
                .await
                .map(Step::Done),
            Operation::EditBlock { content } => edits::preview_edit_blocks(ctx, content).await,
            Operation::Confirm { token, fingerprint } => {
                confirm::confirm(ctx, id, token, fingerprint, cancel)
                    .await
                    .map(Step::Done)
            },
            Operation::Cancel { target } => Ok(Step::Done(self.cancel(target))),
            Operation::Describe => self.describe().map(Step::Done),
            Operation::Ping => Ok(Step::Done("pong".to_string())),
        }
    }

    fn cancel(&self, target: &RequestId) -> String {
        if self.ctx.in_flight.cancel(target) {
            info!(target = %target, "Cancellation requested");
            format!("Cancellation requested for {target}")
        } else {
            format!("No in-flight request {target}")
        }
    }

    fn describe(&self) -> EngineResult<String> {
        let body = json!({
            "protocol_version": PROTOCOL_VERSION,
            "root": self.root().display().to_string(),
            "operations": catalog(),
        });
        serde_json::to_string_pretty(&body).map_err(|e| EngineError::invalid(e.to_string()))
    }

    /// Issue a token for a preview. The fingerprint covers the operation as
    /// requested and the content it was previewed against.
    fn park(&self, operation: &Operation, preview: Preview) -> EngineResult<ConfirmationTicket> {
        let encoded =
            serde_json::to_vec(operation).map_err(|e| EngineError::invalid(e.to_string()))?;
        let fingerprint = {
            let mut parts: Vec<&[u8]> = vec![&encoded];
            parts.extend(preview.parked.digests.iter().map(|(_, d)| d.as_bytes()));
            fingerprint(&parts)
        };

        let Preview {
            target,
            parked,
            text,
        } = preview;
        let proposal =
            self.ctx
                .confirmations
                .propose(target.clone(), parked, text.clone(), fingerprint);
        Ok(ConfirmationTicket {
            token: proposal.token,
            fingerprint: proposal.fingerprint,
            target,
            preview: text,
            expires_at: proposal.expires_at,
        })
    }
}

#[async_trait]
impl OperationService for Engine {
    async fn handle(&self, request: OperationRequest) -> OperationResponse {
        let context = RequestContext::new(request.id.as_str(), request.operation.name());
        let span = context.span();

        async {
            let registration = (!matches!(request.operation, Operation::Cancel { .. }))
                .then(|| self.ctx.in_flight.register(&request.id));
            let cancel = registration
                .as_ref()
                .map(|r| r.token().clone())
                .unwrap_or_default();

            let outcome = match self.dispatch(&request, &cancel).await {
                Ok(Step::Done(output)) => Ok(OperationResponse::completed(request.id.clone(), output)),
                Ok(Step::Confirm(preview)) => self
                    .park(&request.operation, preview)
                    .map(|ticket| OperationResponse::needs_confirmation(request.id.clone(), ticket)),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(response) => {
                    debug!(elapsed_ms = context.elapsed_ms(), "Operation handled");
                    response
                },
                Err(err) => {
                    warn!(
                        kind = %err.kind(),
                        error = %err,
                        elapsed_ms = context.elapsed_ms(),
                        "Operation failed"
                    );
                    OperationResponse::failed(request.id.clone(), &err)
                },
            }
        }
        .instrument(span)
        .await
    }
}
