//! Enclave Telemetry - Logging and request spans.
//!
//! This crate provides:
//! - Subscriber setup with pretty, compact, JSON, or full formats
//! - Output to stderr or a rolling log file; never stdout, which carries the
//!   stdio protocol
//! - [`RequestContext`] for one span per handled operation
//!
//! # Example
//!
//! ```rust,no_run
//! use enclave_telemetry::{LogConfig, LogFormat, RequestContext, setup_logging};
//!
//! # fn main() -> Result<(), enclave_telemetry::TelemetryError> {
//! let config = LogConfig::new("debug")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("enclave_policy=trace");
//! setup_logging(&config)?;
//!
//! let ctx = RequestContext::new("req-1", "read_file").with_source("engine");
//! let _guard = ctx.span().entered();
//! tracing::info!("Handling request");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod context;
mod error;
mod logging;

pub use context::RequestContext;
pub use error::{TelemetryError, TelemetryResult};
pub use logging::{FileRotation, LogConfig, LogFormat, LogTarget, setup_logging};
