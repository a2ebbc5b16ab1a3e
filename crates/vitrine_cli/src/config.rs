//! Vitrine configuration file handling
//!
//! `vitrine.toml` holds two tables:
//! - `[timeline]` - Scroll story layout, measured in viewport heights
//! - `[timer]` - Background timer suspension and storage settings
//!
//! Every field has a default, so an empty or missing file describes the
//! four-slide showcase story.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vitrine_keyframe::{ScrollPosition, TimelineConfig};
use vitrine_platform::SuspensionBehavior;
use vitrine_timer::TimerConfig;

/// Contents of `vitrine.toml`
#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct VitrineConfig {
    #[serde(default)]
    pub timeline: TimelineSection,
    #[serde(default)]
    pub timer: TimerSection,
}

// =============================================================================
// [timeline]
// =============================================================================

/// Scroll story layout
#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct TimelineSection {
    /// Total scroll length, in viewport heights
    #[serde(default = "default_length")]
    pub length: f64,
    /// Height of one viewport, in scroll units
    #[serde(default = "default_viewport_height")]
    pub viewport_height: f64,
    /// Duration of each simulated enter/exit animation
    #[serde(default = "default_animation_ms")]
    pub animation_ms: u64,
    #[serde(default = "default_regions")]
    pub regions: Vec<RegionConfig>,
}

/// One slide of the story
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RegionConfig {
    pub name: String,
    /// Start offset, in viewport heights
    pub start: f64,
    /// End offset, in viewport heights
    pub end: f64,
}

fn default_length() -> f64 {
    6.0
}

fn default_viewport_height() -> f64 {
    800.0
}

fn default_animation_ms() -> u64 {
    300
}

fn default_regions() -> Vec<RegionConfig> {
    [
        ("intro", 0.0, 1.0),
        ("features", 1.5, 2.5),
        ("gallery", 3.0, 4.0),
        ("outro", 4.5, 6.0),
    ]
    .into_iter()
    .map(|(name, start, end)| RegionConfig {
        name: name.to_string(),
        start,
        end,
    })
    .collect()
}

impl Default for TimelineSection {
    fn default() -> Self {
        Self {
            length: default_length(),
            viewport_height: default_viewport_height(),
            animation_ms: default_animation_ms(),
            regions: default_regions(),
        }
    }
}

impl TimelineSection {
    /// Timeline settings in scroll units
    pub fn timeline_config(&self) -> TimelineConfig {
        TimelineConfig {
            length: self.length * self.viewport_height,
        }
    }

    /// Region bounds in scroll units
    pub fn positions(&self) -> impl Iterator<Item = (&str, ScrollPosition)> + '_ {
        self.regions.iter().map(|region| {
            (
                region.name.as_str(),
                ScrollPosition::new(
                    region.start * self.viewport_height,
                    region.end * self.viewport_height,
                ),
            )
        })
    }
}

// =============================================================================
// [timer]
// =============================================================================

/// Background timer settings
#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct TimerSection {
    #[serde(default)]
    pub suspension: SuspensionBehavior,
    /// JSON file used to persist timer state; in-memory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<PathBuf>,
}

impl TimerSection {
    pub fn timer_config(&self) -> TimerConfig {
        TimerConfig {
            suspension: self.suspension,
        }
    }
}

impl VitrineConfig {
    /// Load configuration from a file
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load configuration, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from_path(path);
        }
        tracing::debug!("{} not found, using default configuration", path.display());
        Ok(Self::default())
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_showcase_story() {
        let config: VitrineConfig = toml::from_str("").unwrap();
        assert_eq!(config, VitrineConfig::default());

        let timeline = config.timeline.timeline_config();
        assert_eq!(timeline.length, 4800.0);

        let positions: Vec<_> = config.timeline.positions().collect();
        assert_eq!(positions.len(), 4);
        assert_eq!(positions[1], ("features", ScrollPosition::new(1200.0, 2000.0)));
        assert_eq!(positions[3], ("outro", ScrollPosition::new(3600.0, 4800.0)));
    }

    #[test]
    fn test_partial_tables() {
        let config: VitrineConfig = toml::from_str(
            r#"
            [timeline]
            viewport_height = 1000.0

            [[timeline.regions]]
            name = "only"
            start = 0.5
            end = 2.0

            [timer]
            suspension = "freezes-timers"
            storage = "state/timers.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeline.length, 6.0);
        assert_eq!(config.timeline.animation_ms, 300);
        assert_eq!(
            config.timeline.positions().collect::<Vec<_>>(),
            vec![("only", ScrollPosition::new(500.0, 2000.0))]
        );
        assert_eq!(
            config.timer.timer_config().suspension,
            SuspensionBehavior::FreezesTimers
        );
        assert_eq!(config.timer.storage, Some(PathBuf::from("state/timers.json")));
    }

    #[test]
    fn test_written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vitrine.toml");

        let config = VitrineConfig::default();
        fs::write(&path, config.to_toml().unwrap()).unwrap();
        assert_eq!(VitrineConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(VitrineConfig::load_from_path(&path).is_err());
        assert_eq!(
            VitrineConfig::load_or_default(&path).unwrap(),
            VitrineConfig::default()
        );
    }
}
