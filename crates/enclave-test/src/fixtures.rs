//! Project fixtures and request helpers.

use std::path::{Path, PathBuf};
use std::sync::Once;

use enclave_core::{ConfirmationTicket, Operation, OperationRequest};
use enclave_tools::{Engine, EngineLimits};
use tempfile::TempDir;

/// A throwaway project root.
///
/// The directory is removed when the fixture is dropped.
#[derive(Debug)]
pub struct TempProject {
    dir: TempDir,
    root: PathBuf,
}

impl Default for TempProject {
    fn default() -> Self {
        Self::new()
    }
}

impl TempProject {
    /// Create an empty project.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create tempdir");
        // Canonical so comparisons with engine output hold on macOS /var symlinks.
        let root = dir
            .path()
            .canonicalize()
            .expect("failed to canonicalize tempdir");
        Self { dir, root }
    }

    /// Add a file and return the fixture.
    #[must_use]
    pub fn with_file(self, relative: &str, content: &str) -> Self {
        self.write(relative, content);
        self
    }

    /// Canonical project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `relative`.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write a file, creating parent directories.
    ///
    /// # Panics
    ///
    /// Panics on I/O failure.
    pub fn write(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent directory");
        }
        std::fs::write(&path, content).expect("failed to write fixture file");
    }

    /// Read a file.
    ///
    /// # Panics
    ///
    /// Panics if the file is missing or unreadable.
    #[must_use]
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).expect("failed to read fixture file")
    }

    /// Whether `relative` exists.
    #[must_use]
    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// An engine with default limits rooted here.
    ///
    /// # Panics
    ///
    /// Panics if the engine cannot be built.
    #[must_use]
    pub fn engine(&self) -> Engine {
        test_engine(&self.root)
    }

    /// An engine with custom limits rooted here.
    ///
    /// # Panics
    ///
    /// Panics if the engine cannot be built.
    #[must_use]
    pub fn engine_with(&self, limits: EngineLimits) -> Engine {
        Engine::builder(&self.root)
            .with_limits(limits)
            .build()
            .expect("failed to build engine")
    }

    /// Keep the directory on disk after the fixture is dropped.
    #[must_use]
    pub fn into_temp_dir(self) -> TempDir {
        self.dir
    }
}

/// An engine with default limits rooted at an existing directory.
///
/// # Panics
///
/// Panics if `root` is not a usable project root.
#[must_use]
pub fn test_engine(root: &Path) -> Engine {
    Engine::new(root).expect("failed to build engine")
}

/// Wrap an operation in a request with a fresh id.
#[must_use]
pub fn request(operation: Operation) -> OperationRequest {
    OperationRequest::new(operation)
}

/// The `confirm` operation that redeems `ticket`.
#[must_use]
pub fn confirm(ticket: &ConfirmationTicket) -> Operation {
    Operation::Confirm {
        token: ticket.token.clone(),
        fingerprint: ticket.fingerprint.clone(),
    }
}

/// Route `tracing` output to the test harness once per process.
///
/// Honors `RUST_LOG`; silent by default.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off")),
            )
            .with_test_writer()
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_files() {
        let project = TempProject::new().with_file("src/lib.rs", "pub fn a() {}\n");
        assert!(project.exists("src/lib.rs"));
        assert_eq!(project.read("src/lib.rs"), "pub fn a() {}\n");
        assert!(project.root().is_absolute());
    }
}
