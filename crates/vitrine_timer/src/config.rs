//! Timer configuration

use serde::{Deserialize, Serialize};
use vitrine_platform::SuspensionBehavior;

/// Background timer settings, usually read from the `[timer]` table
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct TimerConfig {
    /// Whether the host freezes timers while backgrounded
    #[serde(default)]
    pub suspension: SuspensionBehavior,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspension_from_toml() {
        let config: TimerConfig = toml::from_str("suspension = \"freezes-timers\"").unwrap();
        assert_eq!(config.suspension, SuspensionBehavior::FreezesTimers);

        let config: TimerConfig = toml::from_str("").unwrap();
        assert_eq!(config.suspension, SuspensionBehavior::for_current_platform());
    }
}
