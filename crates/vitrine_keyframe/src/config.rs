//! Timeline configuration

use serde::{Deserialize, Serialize};

/// Scroll timeline settings, usually read from the `[timeline]` table
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct TimelineConfig {
    /// Logical scroll length of the surface
    #[serde(default = "default_length")]
    pub length: f64,
}

fn default_length() -> f64 {
    2000.0
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            length: default_length(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_length_uses_default() {
        let config: TimelineConfig = toml::from_str("").unwrap();
        assert_eq!(config, TimelineConfig::default());

        let config: TimelineConfig = toml::from_str("length = 4800.0").unwrap();
        assert_eq!(config.length, 4800.0);
    }
}
