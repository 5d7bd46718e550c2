//! Engine bounds: timeouts, waits, and output caps.

use std::time::Duration;

/// Default timeout for `run_command` and `git`.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound for a caller-supplied timeout.
pub const MAX_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);
/// Maximum output size in characters before truncation.
pub const MAX_OUTPUT_CHARS: usize = 30_000;

/// Tunable limits for one engine session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineLimits {
    /// Timeout used when a command does not name one.
    pub command_timeout: Duration,
    /// Cap applied to caller-supplied timeouts.
    pub max_command_timeout: Duration,
    /// How long to wait for a locked path before reporting `Busy`.
    pub busy_wait: Duration,
    /// Lifetime of a confirmation token.
    pub confirmation_ttl: Duration,
    /// Default depth for `list_directory`.
    pub listing_depth: usize,
    /// Entry cap for `list_directory`.
    pub listing_entries: usize,
    /// Default depth for `project_structure`.
    pub structure_depth: usize,
    /// Default entry cap for `project_structure`.
    pub structure_entries: usize,
    /// Command output cap.
    pub max_output_chars: usize,
    /// Shell used for `run_command`.
    pub shell: String,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            max_command_timeout: MAX_COMMAND_TIMEOUT,
            busy_wait: Duration::from_secs(2),
            confirmation_ttl: Duration::from_secs(600),
            listing_depth: 3,
            listing_entries: 1000,
            structure_depth: 3,
            structure_entries: 500,
            max_output_chars: MAX_OUTPUT_CHARS,
            shell: "sh".to_string(),
        }
    }
}

impl EngineLimits {
    /// Timeout for a command, honoring a requested value up to the cap.
    #[must_use]
    pub fn command_timeout(&self, requested_ms: Option<u64>) -> Duration {
        requested_ms
            .map_or(self.command_timeout, Duration::from_millis)
            .min(self.max_command_timeout)
    }

    /// Set the default command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the busy wait.
    #[must_use]
    pub fn with_busy_wait(mut self, wait: Duration) -> Self {
        self.busy_wait = wait;
        self
    }

    /// Set the confirmation token lifetime.
    #[must_use]
    pub fn with_confirmation_ttl(mut self, ttl: Duration) -> Self {
        self.confirmation_ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_capped() {
        let limits = EngineLimits::default();
        assert_eq!(limits.command_timeout(None), Duration::from_secs(30));
        assert_eq!(limits.command_timeout(Some(1500)), Duration::from_millis(1500));
        assert_eq!(
            limits.command_timeout(Some(10_000_000)),
            Duration::from_secs(600)
        );
    }
}
