//! Output formatter for human-readable and JSON output
//!
//! Standard output carries only command results; diagnostics and errors go
//! to standard error.

use console::{StyledObject, style};
use serde::Serialize;

use super::OutputConfig;

/// Formatter for CLI output
///
/// Handles both human-readable and JSON output formats based on configuration.
/// When JSON mode is enabled, all output is strict JSON without colors.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    /// Create a new formatter with the given configuration
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Check if JSON output mode is enabled
    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// Check if colors are enabled
    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    /// Apply the color setting to a styled value
    ///
    /// With colors enabled, terminal detection still decides; otherwise
    /// styling is forced off.
    pub fn paint<D>(&self, styled: StyledObject<D>) -> StyledObject<D> {
        if self.colors_enabled() {
            styled
        } else {
            styled.force_styling(false)
        }
    }

    /// Output an error message
    ///
    /// Errors are always printed to standard error.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let error = serde_json::json!({
                "error": message
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error).unwrap_or_else(|_| message.to_string())
            );
        } else {
            eprintln!("{} {message}", self.paint(style("✗").red()));
        }
    }

    /// Output a warning message
    pub fn warning(&self, message: &str) {
        if self.config.json {
            return;
        }
        eprintln!("{} {message}", self.paint(style("⚠").yellow()));
    }

    /// Output JSON directly
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text to standard output
    pub fn println(&self, message: &str) {
        println!("{message}");
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}
