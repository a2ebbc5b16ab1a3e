//! Scroll timeline
//!
//! Owns the regions declared on one scrollable surface and forwards every
//! offset sample to each of them. Samples are processed synchronously;
//! handshakes triggered by a sample run on the tokio runtime the timeline
//! was created on and never block the next sample.

use crate::config::TimelineConfig;
use crate::error::{Result, TimelineError};
use crate::position::ScrollPosition;
use crate::region::{RegionCallbacks, RegionHandle};
use slotmap::{new_key_type, SlotMap};
use tokio::runtime::Handle;

new_key_type! {
    /// Handle to a region declared on a timeline
    pub struct RegionId;
}

/// A scrollable surface of fixed logical length with keyframe regions
pub struct ScrollTimeline {
    length: f64,
    offset: f64,
    regions: SlotMap<RegionId, RegionHandle>,
    runtime: Handle,
}

impl ScrollTimeline {
    /// Create a timeline on the current tokio runtime
    pub fn new(length: f64) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| TimelineError::NoRuntime)?;
        Self::with_runtime(length, runtime)
    }

    /// Create a timeline whose handshakes run on `runtime`
    pub fn with_runtime(length: f64, runtime: Handle) -> Result<Self> {
        if !length.is_finite() || length < 0.0 {
            return Err(TimelineError::InvalidLength(length));
        }
        Ok(Self {
            length,
            offset: 0.0,
            regions: SlotMap::with_key(),
            runtime,
        })
    }

    pub fn from_config(config: &TimelineConfig) -> Result<Self> {
        Self::new(config.length)
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    /// Last offset reported by the scroll surface
    pub fn scroll_offset(&self) -> f64 {
        self.offset
    }

    /// Overall scroll progress across the whole timeline
    pub fn progress(&self) -> f64 {
        ScrollPosition::new(0.0, self.length).progress(self.offset)
    }

    /// Declare a region; it is evaluated against the current offset at once
    pub fn declare_region(&mut self, position: ScrollPosition) -> RegionHandle {
        self.declare_region_with(position, RegionCallbacks::default())
    }

    /// Declare a region with synchronous enter/exit notifications
    pub fn declare_region_with(
        &mut self,
        position: ScrollPosition,
        callbacks: RegionCallbacks,
    ) -> RegionHandle {
        if position.is_degenerate() {
            tracing::warn!(
                "ScrollTimeline: degenerate region {}..{}, progress will stay at 0",
                position.start,
                position.end
            );
        }

        let offset = self.offset;
        let runtime = self.runtime.clone();
        let id = self.regions.insert_with_key(|id| {
            RegionHandle::new(id, position, callbacks, offset, runtime)
        });

        let region = self.regions[id].clone();
        region.observe(offset);
        region
    }

    /// Remove a region, aborting any handshake still in flight
    pub fn remove_region(&mut self, id: RegionId) -> Option<RegionHandle> {
        let region = self.regions.remove(id)?;
        region.detach();
        Some(region)
    }

    pub fn region(&self, id: RegionId) -> Option<&RegionHandle> {
        self.regions.get(id)
    }

    pub fn regions(&self) -> impl Iterator<Item = &RegionHandle> {
        self.regions.values()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Regions whose bounds contain the current offset
    pub fn active_regions(&self) -> Vec<RegionId> {
        self.regions
            .iter()
            .filter(|(_, region)| region.is_active())
            .map(|(id, _)| id)
            .collect()
    }

    /// Feed one scroll sample to every region
    pub fn on_offset_changed(&mut self, offset: f64) {
        if !offset.is_finite() {
            tracing::warn!("ScrollTimeline: ignoring non-finite offset {}", offset);
            return;
        }

        self.offset = offset;
        for region in self.regions.values() {
            region.observe(offset);
        }
    }
}

impl std::fmt::Debug for ScrollTimeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollTimeline")
            .field("length", &self.length)
            .field("offset", &self.offset)
            .field("regions", &self.regions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_invalid_length() {
        assert!(matches!(
            ScrollTimeline::new(f64::NAN),
            Err(TimelineError::InvalidLength(_))
        ));
        assert!(matches!(
            ScrollTimeline::new(-1.0),
            Err(TimelineError::InvalidLength(_))
        ));
        assert!(ScrollTimeline::new(0.0).is_ok());
    }

    #[test]
    fn test_requires_runtime() {
        assert!(matches!(
            ScrollTimeline::new(2000.0),
            Err(TimelineError::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn test_from_config_uses_length() {
        let timeline = ScrollTimeline::from_config(&TimelineConfig::default()).unwrap();
        assert_eq!(timeline.length(), 2000.0);
        assert_eq!(timeline.scroll_offset(), 0.0);
    }

    #[tokio::test]
    async fn test_region_registry() {
        let mut timeline = ScrollTimeline::new(2000.0).unwrap();
        let first = timeline.declare_region(ScrollPosition::new(0.0, 500.0));
        let second = timeline.declare_region(ScrollPosition::new(750.0, 1250.0));
        assert_eq!(timeline.region_count(), 2);

        // Offset 0 sits inside the first region on declaration
        assert_eq!(timeline.active_regions(), vec![first.id()]);

        timeline.on_offset_changed(1000.0);
        assert_eq!(timeline.active_regions(), vec![second.id()]);
        assert_eq!(timeline.progress(), 0.5);

        let removed = timeline.remove_region(second.id()).unwrap();
        assert_eq!(removed.id(), second.id());
        assert!(timeline.region(second.id()).is_none());
        assert!(timeline.remove_region(second.id()).is_none());
        assert_eq!(timeline.region_count(), 1);
    }

    #[tokio::test]
    async fn test_non_finite_offsets_are_ignored() {
        let mut timeline = ScrollTimeline::new(2000.0).unwrap();
        let region = timeline.declare_region(ScrollPosition::new(0.0, 500.0));

        timeline.on_offset_changed(f64::NAN);
        timeline.on_offset_changed(f64::INFINITY);
        assert_eq!(timeline.scroll_offset(), 0.0);
        assert!(region.is_active());
    }
}
