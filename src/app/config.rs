//! Application configuration
//!
//! Process-wide settings that sit above a single pipeline run.

/// Application configuration structure
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Suppress the progress spinner
    pub quiet: bool,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            quiet: false,
        }
    }

    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Spinner only when logs are not already narrating progress
    pub fn show_progress(&self) -> bool {
        !self.quiet && self.verbose == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_levels() {
        assert_eq!(AppConfig::new(0).log_level(), "info");
        assert_eq!(AppConfig::new(1).log_level(), "debug");
        assert_eq!(AppConfig::new(3).log_level(), "trace");
    }

    #[test]
    fn test_progress_visibility() {
        assert!(AppConfig::new(0).show_progress());
        assert!(!AppConfig::new(1).show_progress());
        assert!(!AppConfig::new(0).with_quiet(true).show_progress());
    }
}
