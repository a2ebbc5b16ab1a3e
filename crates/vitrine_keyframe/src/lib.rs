//! Vitrine Keyframe Timeline
//!
//! Scroll-driven keyframe regions with directional enter/exit choreography.
//!
//! # Features
//!
//! - **Regions**: Scroll-offset ranges that activate while the offset is inside them
//! - **Directions**: Entry and exit sides computed once per activation edge
//! - **Handshakes**: Content registers enter/exit handlers; the region waits for
//!   all of them before it counts as entered or unmounts
//! - **Buffered entry**: An activation seen before any handler exists is replayed,
//!   once, to the first handler that registers
//! - **Progress**: Normalized `[0, 1]` position inside the active region
//!
//! # Example
//!
//! ```ignore
//! use vitrine_keyframe::prelude::*;
//!
//! let mut timeline = ScrollTimeline::new(2000.0)?;
//! let slide = timeline.declare_region(ScrollPosition::new(100.0, 500.0));
//!
//! let registration = slide.register_directional_exit(|direction, done| {
//!     // play an exit animation towards `direction`, then:
//!     done.complete();
//! });
//!
//! timeline.on_offset_changed(250.0);
//! assert!(slide.is_active());
//! ```

pub mod config;
pub mod direction;
pub mod error;
pub mod handshake;
pub mod position;
pub mod region;
pub mod timeline;


pub use config::TimelineConfig;
pub use direction::{EntryDirection, ExitDirection};
pub use error::{Result, TimelineError};
pub use handshake::{Completion, HandlerId};
pub use position::ScrollPosition;
pub use region::{
    EdgeCallback, RegionCallbacks, RegionHandle, RegionPhase, Registration, RenderState,
};
pub use timeline::{RegionId, ScrollTimeline};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::TimelineConfig;
    pub use crate::direction::{EntryDirection, ExitDirection};
    pub use crate::error::{Result, TimelineError};
    pub use crate::handshake::Completion;
    pub use crate::position::ScrollPosition;
    pub use crate::region::{RegionCallbacks, RegionHandle, RegionPhase, Registration, RenderState};
    pub use crate::timeline::{RegionId, ScrollTimeline};
}
