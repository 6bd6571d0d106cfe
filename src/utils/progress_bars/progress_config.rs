// src/utils/progress_bars/progress_config.rs

use indicatif::MultiProgress;
use std::env;

/// Configuration for progress tracking throughout the pipeline
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Whether to show progress bars at all
    pub enabled: bool,
    /// Whether to show the per-stage sub-progress bar
    pub detailed: bool,
    /// Refresh rate for progress bars in milliseconds
    pub refresh_rate_ms: u64,
    /// Whether to show memory usage in progress messages
    pub show_memory: bool,
    /// How many pair comparisons pass between edge-building progress reports
    pub report_every_pairs: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detailed: true,
            refresh_rate_ms: 100,
            show_memory: true,
            report_every_pairs: 5000,
        }
    }
}

impl ProgressConfig {
    /// Create progress configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            enabled: lookup("PROGRESS_ENABLED")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.enabled),
            detailed: lookup("PROGRESS_DETAILED")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.detailed),
            refresh_rate_ms: lookup("PROGRESS_REFRESH_RATE_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.refresh_rate_ms),
            show_memory: lookup("PROGRESS_SHOW_MEMORY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.show_memory),
            report_every_pairs: lookup("PROGRESS_REPORT_EVERY_PAIRS")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.report_every_pairs),
        }
    }

    /// Create a MultiProgress instance if progress is enabled, None otherwise
    pub fn create_multi_progress(&self) -> Option<MultiProgress> {
        if self.enabled {
            Some(MultiProgress::new())
        } else {
            None
        }
    }

    pub fn should_show_detailed(&self) -> bool {
        self.enabled && self.detailed
    }

    pub fn should_show_memory(&self) -> bool {
        self.enabled && self.show_memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ProgressConfig::default();
        assert!(config.enabled);
        assert!(config.detailed);
        assert_eq!(config.refresh_rate_ms, 100);
        assert!(config.show_memory);
        assert_eq!(config.report_every_pairs, 5000);
    }

    #[test]
    fn test_lookup_config() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PROGRESS_ENABLED", "false"),
            ("PROGRESS_DETAILED", "false"),
            ("PROGRESS_REFRESH_RATE_MS", "50"),
            ("PROGRESS_SHOW_MEMORY", "false"),
            ("PROGRESS_REPORT_EVERY_PAIRS", "250"),
        ]);

        let config = ProgressConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert!(!config.enabled);
        assert!(!config.detailed);
        assert_eq!(config.refresh_rate_ms, 50);
        assert!(!config.show_memory);
        assert_eq!(config.report_every_pairs, 250);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = ProgressConfig::from_lookup(|key| match key {
            "PROGRESS_ENABLED" => Some("maybe".to_string()),
            "PROGRESS_REPORT_EVERY_PAIRS" => Some("0".to_string()),
            _ => None,
        });
        assert!(config.enabled);
        assert_eq!(config.report_every_pairs, 5000);
    }

    #[test]
    fn test_multi_progress_creation() {
        let mut config = ProgressConfig::default();

        config.enabled = true;
        assert!(config.create_multi_progress().is_some());

        config.enabled = false;
        assert!(config.create_multi_progress().is_none());
    }

    #[test]
    fn test_should_show_methods() {
        let mut config = ProgressConfig::default();

        config.enabled = true;
        config.detailed = true;
        config.show_memory = true;
        assert!(config.should_show_detailed());
        assert!(config.should_show_memory());

        config.enabled = false;
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());

        config.enabled = true;
        config.detailed = false;
        config.show_memory = false;
        assert!(!config.should_show_detailed());
        assert!(!config.should_show_memory());
    }
}
