//! Terminal styling for `botvy` output.

use botvy_plugins::PluginState;
use colored::Colorize;

/// Width of [`Theme::rule`].
const RULE_WIDTH: usize = 60;

/// Styled text fragments.
pub(crate) struct Theme;

impl Theme {
    /// Section heading.
    pub(crate) fn heading(text: &str) -> String {
        text.bold().cyan().to_string()
    }

    /// A line for something that worked.
    pub(crate) fn ok(text: &str) -> String {
        format!("{} {text}", "✓".green().bold())
    }

    /// A line for something that failed.
    pub(crate) fn fail(text: &str) -> String {
        format!("{} {}", "✗".red().bold(), text.red())
    }

    /// A line for something that was skipped.
    pub(crate) fn warn(text: &str) -> String {
        format!("{} {}", "-".yellow().bold(), text.yellow())
    }

    /// A neutral remark.
    pub(crate) fn note(text: &str) -> String {
        format!("{} {text}", "·".blue())
    }

    /// De-emphasized text.
    pub(crate) fn muted(text: &str) -> String {
        text.dimmed().to_string()
    }

    /// Horizontal rule under a heading.
    pub(crate) fn rule() -> String {
        "─".repeat(RULE_WIDTH).dimmed().to_string()
    }

    /// Fixed-width badge for a plugin lifecycle state.
    pub(crate) fn plugin_state(state: &PluginState) -> String {
        match state {
            PluginState::Instantiated => format!("{:<7}", "loaded").blue().to_string(),
            PluginState::Initializing => format!("{:<7}", "pending").yellow().to_string(),
            PluginState::Ready => format!("{:<7}", "ready").green().to_string(),
            PluginState::Failed(_) => format!("{:<7}", "failed").red().bold().to_string(),
        }
    }
}
