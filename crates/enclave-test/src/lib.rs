//! Enclave Test - Shared test utilities for the Enclave engine and bridge.
//!
//! This crate provides project fixtures, a scripted [`OperationService`]
//! and an in-process [`RemoteLauncher`] that can be used across Enclave
//! crates as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! enclave-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use enclave_core::{Operation, OperationRequest, OperationService};
//! use enclave_test::TempProject;
//!
//! #[tokio::test]
//! async fn test_read() {
//!     let project = TempProject::new().with_file("a.txt", "hello\n");
//!     let engine = project.engine();
//!     let response = engine
//!         .handle(OperationRequest::new(Operation::ReadFile {
//!             path: "a.txt".into(),
//!             offset: None,
//!             limit: None,
//!         }))
//!         .await;
//!     assert!(response.output().unwrap().contains("hello"));
//! }
//! ```
//!
//! [`OperationService`]: enclave_core::OperationService
//! [`RemoteLauncher`]: enclave_bridge::RemoteLauncher

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

pub mod fixtures;
pub mod launcher;
pub mod mocks;

pub use fixtures::*;
pub use launcher::*;
pub use mocks::*;
