//! Terminal styling for `enclave` output.

use colored::Colorize;
use enclave_bridge::SessionState;

/// Styles for status lines printed by the CLI.
pub(crate) struct Theme;

impl Theme {
    /// Section heading.
    pub(crate) fn header(text: &str) -> String {
        text.bold().cyan().to_string()
    }

    /// Something finished.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {text}", "✓".green())
    }

    /// Fatal problem.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Recoverable problem or teardown notice.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Progress or pointer to somewhere else.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {text}", "i".blue())
    }

    /// Secondary detail.
    pub(crate) fn dimmed(text: &str) -> String {
        text.dimmed().to_string()
    }

    /// Aligned `key: value` line.
    pub(crate) fn kv(key: &str, value: &str) -> String {
        let label = format!("{key}:");
        format!("  {} {value}", format!("{label:<14}").dimmed())
    }

    /// Bridge session state, colored by health.
    pub(crate) fn state(state: &SessionState) -> String {
        match state {
            SessionState::Connecting => "connecting".yellow().to_string(),
            SessionState::Active => "active".green().bold().to_string(),
            SessionState::Disconnected { reason } => {
                format!("{} ({reason})", "disconnected".red())
            },
            SessionState::Closed => "closed".dimmed().to_string(),
        }
    }
}
