//! Headless scroll story
//!
//! Sweeps the scroll offset across the configured timeline one frame at a
//! time. Each region gets a simulated host that mounts content while the
//! region should render; mounted content plays a fixed-length enter/exit
//! animation through the region's handshake.

use crate::config::TimelineSection;
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use vitrine_keyframe::{RegionCallbacks, RegionHandle, ScrollTimeline};

/// How the offset moves across the timeline
#[derive(Clone, Copy, Debug)]
pub struct Sweep {
    /// Offset change per frame
    pub step: f64,
    pub frame: Duration,
    /// Scroll back to the top after reaching the end
    pub bounce: bool,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            step: 40.0,
            frame: Duration::from_millis(16),
            bounce: false,
        }
    }
}

/// Edge counts for one region after a sweep
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RegionReport {
    pub name: String,
    pub entries: usize,
    pub exits: usize,
    pub rendering: bool,
}

struct Tracked {
    name: String,
    region: RegionHandle,
    entries: Arc<AtomicUsize>,
    exits: Arc<AtomicUsize>,
}

pub async fn run_scroll(section: &TimelineSection, sweep: Sweep) -> Result<Vec<RegionReport>> {
    anyhow::ensure!(sweep.step > 0.0, "Sweep step must be positive, got {}", sweep.step);

    let mut timeline = ScrollTimeline::from_config(&section.timeline_config())?;
    let animation = Duration::from_millis(section.animation_ms);

    let mut tracked = Vec::new();
    for (name, position) in section.positions() {
        let entries = Arc::new(AtomicUsize::new(0));
        let exits = Arc::new(AtomicUsize::new(0));

        let callbacks = {
            let (entries, exits) = (entries.clone(), exits.clone());
            let (enter_name, exit_name) = (name.to_string(), name.to_string());
            RegionCallbacks::new()
                .on_enter(move |direction| {
                    entries.fetch_add(1, Ordering::SeqCst);
                    info!("{}: enter from {}", enter_name, direction);
                })
                .on_exit(move |direction| {
                    exits.fetch_add(1, Ordering::SeqCst);
                    info!("{}: exit through {}", exit_name, direction);
                })
        };

        let region = timeline.declare_region_with(position, callbacks);
        tokio::spawn(host_content(name.to_string(), region.clone(), animation));
        tracked.push(Tracked {
            name: name.to_string(),
            region,
            entries,
            exits,
        });
    }

    let length = timeline.length();
    let mut offsets = stepped(0.0, length, sweep.step);
    if sweep.bounce {
        offsets.extend(stepped(length, 0.0, sweep.step));
    }

    for offset in offsets {
        timeline.on_offset_changed(offset);
        for region in timeline.regions().filter(|region| region.is_active()) {
            debug!(
                "offset {:>7.1}: {:?} at {:.2}",
                offset,
                region.id(),
                region.progress()
            );
        }
        tokio::time::sleep(sweep.frame).await;
    }

    // Let the trailing exit animations finish
    tokio::time::sleep(animation * 2).await;

    let reports = tracked
        .into_iter()
        .map(|tracked| RegionReport {
            rendering: tracked.region.should_render(),
            entries: tracked.entries.load(Ordering::SeqCst),
            exits: tracked.exits.load(Ordering::SeqCst),
            name: tracked.name,
        })
        .collect();
    Ok(reports)
}

/// Offsets from `from` to `to` inclusive, `step` apart
fn stepped(from: f64, to: f64, step: f64) -> Vec<f64> {
    let count = ((to - from).abs() / step).ceil() as usize;
    let sign = if to >= from { 1.0 } else { -1.0 };
    (1..=count)
        .map(|frame| {
            let offset = from + sign * step * frame as f64;
            if sign > 0.0 {
                offset.min(to)
            } else {
                offset.max(to)
            }
        })
        .collect()
}

/// Mount content while the region renders, unmount when it stops
///
/// A new mount id while still rendering means the region was re-entered
/// during its exit: the old content is gone and must be mounted again.
async fn host_content(name: String, region: RegionHandle, animation: Duration) {
    let mut render = region.subscribe_render();
    let mut mounted: Option<u64> = None;

    loop {
        let state = *render.borrow_and_update();
        let wanted = state.should_render.then_some(state.mount);
        if mounted != wanted {
            if mounted.is_some() {
                info!("{}: unmounted", name);
            }
            if wanted.is_some() {
                mount_content(&name, &region, animation);
            }
            mounted = wanted;
        }

        if render.changed().await.is_err() {
            return;
        }
    }
}

fn mount_content(name: &str, region: &RegionHandle, animation: Duration) {
    info!("{}: mounted", name);

    let label = name.to_string();
    region.register_directional_entry(move |direction, done| {
        let label = label.clone();
        tokio::spawn(async move {
            tokio::time::sleep(animation).await;
            debug!("{}: slid in from {}", label, direction);
            done.complete();
        });
    });

    let label = name.to_string();
    region.register_directional_exit(move |direction, done| {
        let label = label.clone();
        tokio::spawn(async move {
            tokio::time::sleep(animation).await;
            debug!("{}: slid out through {}", label, direction);
            done.complete();
        });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_keyframe::{RegionPhase, ScrollPosition};

    fn counts(reports: &[RegionReport]) -> Vec<(usize, usize, bool)> {
        reports
            .iter()
            .map(|report| (report.entries, report.exits, report.rendering))
            .collect()
    }

    #[test]
    fn test_stepped_reaches_target() {
        assert_eq!(stepped(0.0, 100.0, 40.0), vec![40.0, 80.0, 100.0]);
        assert_eq!(stepped(100.0, 0.0, 40.0), vec![60.0, 20.0, 0.0]);
        assert!(stepped(5.0, 5.0, 1.0).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_down_the_story() {
        let section = TimelineSection::default();
        let reports = run_scroll(&section, Sweep::default()).await.unwrap();

        let names: Vec<_> = reports.iter().map(|report| report.name.as_str()).collect();
        assert_eq!(names, vec!["intro", "features", "gallery", "outro"]);

        // The last slide contains the end of the timeline
        assert_eq!(
            counts(&reports),
            vec![(1, 1, false), (1, 1, false), (1, 1, false), (1, 0, true)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounce_returns_to_first_slide() {
        let section = TimelineSection::default();
        let sweep = Sweep {
            bounce: true,
            ..Sweep::default()
        };
        let reports = run_scroll(&section, sweep).await.unwrap();

        assert_eq!(
            counts(&reports),
            vec![(2, 1, true), (2, 2, false), (2, 2, false), (1, 1, false)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reentry_during_exit_remounts_content() {
        let mut timeline = ScrollTimeline::new(2000.0).unwrap();
        let region = timeline.declare_region(ScrollPosition::new(100.0, 500.0));
        let animation = Duration::from_millis(100);
        tokio::spawn(host_content("slide".to_string(), region.clone(), animation));

        timeline.on_offset_changed(250.0);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(region.is_entered());

        // Leave, then come back while the exit animation is still running
        timeline.on_offset_changed(700.0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        timeline.on_offset_changed(300.0);
        assert_eq!(region.phase(), RegionPhase::Exiting);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(region.is_active());
        assert!(region.is_entered());
        assert_eq!(region.entry_handler_count(), 1);
        assert_eq!(region.exit_handler_count(), 1);

        // The remounted content plays its exit again
        timeline.on_offset_changed(700.0);
        assert_eq!(region.phase(), RegionPhase::Exiting);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!region.should_render());
    }

    #[tokio::test]
    async fn test_rejects_non_positive_step() {
        let sweep = Sweep {
            step: 0.0,
            ..Sweep::default()
        };
        assert!(run_scroll(&TimelineSection::default(), sweep).await.is_err());
    }
}
