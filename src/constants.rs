//! Constants used throughout the proxy
//!
//! This module centralizes magic numbers and configuration values
//! to improve maintainability and reduce duplication.

/// Default port the proxy listens on when neither CLI nor config specify one
pub const DEFAULT_PORT: u16 = 3000;

/// Default host the proxy binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Limits for the process leg of a session
pub mod process {
    /// Maximum length of a single backend stdout line (1MB)
    ///
    /// Backend messages are newline-delimited; a line longer than this is
    /// treated as a transport fault rather than buffered without bound.
    pub const MAX_LINE_LENGTH: usize = 1024 * 1024;
}
