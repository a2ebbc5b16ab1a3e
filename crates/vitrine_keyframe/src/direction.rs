//! Entry and exit directions
//!
//! Directions are computed once per activation edge from the scroll offsets
//! on either side of that edge, never per sample.

use crate::position::ScrollPosition;
use std::fmt;

/// Side from which a region was entered
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EntryDirection {
    /// Scrolled down into the region (came from above `start`)
    Top,
    /// Scrolled up into the region (came from below `end`)
    Bottom,
    /// Not entered yet
    #[default]
    None,
}

impl EntryDirection {
    /// Resolve the entry direction for an activation edge
    ///
    /// `previous` is the last offset seen before the edge, `current` the
    /// offset that activated the region. When `previous` already lies inside
    /// the region (first evaluation), the side of the midpoint decides.
    pub fn resolve(previous: f64, current: f64, position: &ScrollPosition) -> Self {
        if previous < position.start {
            EntryDirection::Top
        } else if previous > position.end {
            EntryDirection::Bottom
        } else if current <= position.midpoint() {
            EntryDirection::Top
        } else {
            EntryDirection::Bottom
        }
    }
}

impl fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntryDirection::Top => "top",
            EntryDirection::Bottom => "bottom",
            EntryDirection::None => "none",
        })
    }
}

/// Side through which a region was left
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExitDirection {
    /// Scrolled back up past `start`
    Top,
    /// Scrolled down past `end`
    Bottom,
    /// Not exited yet
    #[default]
    None,
}

impl ExitDirection {
    /// Resolve the exit direction from the offset that deactivated the region
    pub fn resolve(current: f64, position: &ScrollPosition) -> Self {
        if current < position.start {
            ExitDirection::Top
        } else {
            ExitDirection::Bottom
        }
    }
}

impl fmt::Display for ExitDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExitDirection::Top => "top",
            ExitDirection::Bottom => "bottom",
            ExitDirection::None => "none",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide() -> ScrollPosition {
        ScrollPosition::new(100.0, 500.0)
    }

    #[test]
    fn test_entry_from_above_is_top() {
        assert_eq!(
            EntryDirection::resolve(0.0, 250.0, &slide()),
            EntryDirection::Top
        );
    }

    #[test]
    fn test_entry_from_below_is_bottom() {
        assert_eq!(
            EntryDirection::resolve(600.0, 300.0, &slide()),
            EntryDirection::Bottom
        );
    }

    #[test]
    fn test_ambiguous_entry_uses_midpoint() {
        // Midpoint is 300; ties go to Top
        assert_eq!(
            EntryDirection::resolve(200.0, 300.0, &slide()),
            EntryDirection::Top
        );
        assert_eq!(
            EntryDirection::resolve(450.0, 450.0, &slide()),
            EntryDirection::Bottom
        );
    }

    #[test]
    fn test_exit_directions() {
        assert_eq!(ExitDirection::resolve(50.0, &slide()), ExitDirection::Top);
        assert_eq!(
            ExitDirection::resolve(700.0, &slide()),
            ExitDirection::Bottom
        );
    }

    #[test]
    fn test_defaults_are_none() {
        assert_eq!(EntryDirection::default(), EntryDirection::None);
        assert_eq!(ExitDirection::default(), ExitDirection::None);
        assert_eq!(EntryDirection::Top.to_string(), "top");
        assert_eq!(ExitDirection::Bottom.to_string(), "bottom");
    }
}
