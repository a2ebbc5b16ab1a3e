//! Keyframe region state machine
//!
//! A region is one logical "slide" of scroll-driven content. It moves
//! through three phases:
//!
//! ```text
//!            offset inside                 offset outside
//! Inactive ----------------> Active ------------------------> Exiting
//!    ^                                                           |
//!    +------------- every exit handler completed ----------------+
//! ```
//!
//! `Active` is what content reads as "current" (progress is live), while
//! content stays mounted (`should_render`) through `Exiting` so exit
//! animations can play after the region has been left. Samples that arrive
//! during `Exiting` are recorded but not evaluated; once the exit handshake
//! completes, the latest offset is evaluated again.

use crate::direction::{EntryDirection, ExitDirection};
use crate::handshake::{
    erase_async, erase_directional, fan_out, Completion, Handler, HandlerBatch, HandlerId,
    HandlerSet,
};
use crate::position::ScrollPosition;
use crate::timeline::RegionId;
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Synchronous edge notification
pub type EdgeCallback<D> = Arc<dyn Fn(D) + Send + Sync>;

/// Optional synchronous notifications fired on activation edges
///
/// These fire on the edge itself, before any registered handler is started.
#[derive(Clone, Default)]
pub struct RegionCallbacks {
    on_enter: Option<EdgeCallback<EntryDirection>>,
    on_exit: Option<EdgeCallback<ExitDirection>>,
}

impl RegionCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enter<F>(mut self, callback: F) -> Self
    where
        F: Fn(EntryDirection) + Send + Sync + 'static,
    {
        self.on_enter = Some(Arc::new(callback));
        self
    }

    pub fn on_exit<F>(mut self, callback: F) -> Self
    where
        F: Fn(ExitDirection) + Send + Sync + 'static,
    {
        self.on_exit = Some(Arc::new(callback));
        self
    }
}

/// Lifecycle phase of a region
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegionPhase {
    /// Not active, content unmounted
    Inactive,
    /// Last offset was inside the region
    Active,
    /// Left the region; waiting for exit handlers before unmounting
    Exiting,
}

/// Mount decision published to the host
///
/// `mount` identifies the activation the content belongs to. A region that
/// is re-entered while its exit is still running unmounts and re-activates
/// in one step; the host sees `should_render` stay true but `mount` change,
/// and must remount (and re-register) its content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderState {
    pub should_render: bool,
    pub mount: u64,
}

/// Entry direction buffered for handlers that are not registered yet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingEntry {
    NotPending,
    Pending(EntryDirection),
    Consumed,
}

/// Work to run outside the state lock after an edge
enum Edge {
    Enter {
        epoch: u64,
        direction: EntryDirection,
        // None: no handler yet, direction buffered
        handlers: Option<HandlerBatch<EntryDirection>>,
    },
    Exit {
        epoch: u64,
        direction: ExitDirection,
        handlers: HandlerBatch<ExitDirection>,
    },
}

struct RegionState {
    position: ScrollPosition,
    phase: RegionPhase,
    /// Incremented on every activation; stale completions carry an old epoch
    epoch: u64,
    entered: bool,
    offset: f64,
    exit_offset: f64,
    entry_direction: EntryDirection,
    exit_direction: ExitDirection,
    pending_entry: PendingEntry,
    entry_handlers: HandlerSet<EntryDirection>,
    exit_handlers: HandlerSet<ExitDirection>,
    joins: SmallVec<[AbortHandle; 2]>,
}

impl RegionState {
    fn new(position: ScrollPosition, offset: f64) -> Self {
        Self {
            position,
            phase: RegionPhase::Inactive,
            epoch: 0,
            entered: false,
            offset,
            exit_offset: offset,
            entry_direction: EntryDirection::None,
            exit_direction: ExitDirection::None,
            pending_entry: PendingEntry::NotPending,
            entry_handlers: HandlerSet::new(),
            exit_handlers: HandlerSet::new(),
            joins: SmallVec::new(),
        }
    }

    fn should_render(&self) -> bool {
        self.phase != RegionPhase::Inactive
    }

    fn render_state(&self) -> RenderState {
        RenderState {
            should_render: self.should_render(),
            mount: self.epoch,
        }
    }

    fn observe(&mut self, offset: f64) -> Option<Edge> {
        let previous = self.offset;
        self.offset = offset;

        match self.phase {
            RegionPhase::Inactive if self.position.contains(offset) => {
                Some(self.activate(previous, offset))
            }
            RegionPhase::Active if !self.position.contains(offset) => {
                Some(self.deactivate(offset))
            }
            _ => None,
        }
    }

    fn activate(&mut self, previous: f64, current: f64) -> Edge {
        let direction = EntryDirection::resolve(previous, current, &self.position);

        self.epoch += 1;
        self.phase = RegionPhase::Active;
        self.entered = false;
        self.entry_direction = direction;

        let handlers = if self.entry_handlers.is_empty() {
            self.pending_entry = PendingEntry::Pending(direction);
            None
        } else {
            self.pending_entry = PendingEntry::Consumed;
            Some(self.entry_handlers.snapshot())
        };

        Edge::Enter {
            epoch: self.epoch,
            direction,
            handlers,
        }
    }

    fn deactivate(&mut self, current: f64) -> Edge {
        let direction = ExitDirection::resolve(current, &self.position);

        self.phase = RegionPhase::Exiting;
        self.exit_direction = direction;
        self.exit_offset = current;

        Edge::Exit {
            epoch: self.epoch,
            direction,
            handlers: self.exit_handlers.snapshot(),
        }
    }

    /// Hand the buffered entry direction to a newly registered handler, once
    fn take_pending_entry(&mut self) -> Option<(u64, EntryDirection)> {
        match self.pending_entry {
            PendingEntry::Pending(direction) if self.phase == RegionPhase::Active => {
                self.pending_entry = PendingEntry::Consumed;
                Some((self.epoch, direction))
            }
            _ => None,
        }
    }

    /// Unmount after the exit handshake; false if the completion is stale
    fn finish_exit(&mut self, epoch: u64) -> bool {
        if self.phase != RegionPhase::Exiting || self.epoch != epoch {
            return false;
        }

        self.phase = RegionPhase::Inactive;
        self.entered = false;
        self.pending_entry = PendingEntry::NotPending;
        // Content is unmounted with the region, its handlers go with it
        self.entry_handlers.clear();
        self.exit_handlers.clear();
        true
    }

    /// Evaluate samples that arrived while the exit was in flight
    fn reevaluate(&mut self) -> Option<Edge> {
        if self.phase == RegionPhase::Inactive && self.position.contains(self.offset) {
            let (previous, current) = (self.exit_offset, self.offset);
            Some(self.activate(previous, current))
        } else {
            None
        }
    }

    fn track_join(&mut self, join: AbortHandle) {
        self.joins.retain(|handle| !handle.is_finished());
        self.joins.push(join);
    }
}

pub(crate) struct RegionShared {
    id: RegionId,
    state: Mutex<RegionState>,
    callbacks: RegionCallbacks,
    render: watch::Sender<RenderState>,
    runtime: Handle,
}

impl RegionShared {
    fn lock(&self) -> MutexGuard<'_, RegionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sync_render(&self, state: &RegionState) {
        let render = state.render_state();
        self.render.send_if_modified(|current| {
            if *current != render {
                *current = render;
                true
            } else {
                false
            }
        });
    }

    fn observe(self: &Arc<Self>, offset: f64) {
        let edge = {
            let mut state = self.lock();
            let edge = state.observe(offset);
            self.sync_render(&state);
            edge
        };
        if let Some(edge) = edge {
            self.run_edge(edge);
        }
    }

    fn run_edge(self: &Arc<Self>, edge: Edge) {
        match edge {
            Edge::Enter {
                epoch,
                direction,
                handlers,
            } => {
                tracing::debug!("Region {:?}: enter from {} (epoch {})", self.id, direction, epoch);
                if let Some(on_enter) = &self.callbacks.on_enter {
                    on_enter(direction);
                }
                match handlers {
                    Some(batch) => self.run_entry(epoch, direction, batch),
                    None => tracing::trace!(
                        "Region {:?}: no entry handlers yet, buffering {}",
                        self.id,
                        direction
                    ),
                }
            }
            Edge::Exit {
                epoch,
                direction,
                handlers,
            } => {
                tracing::debug!("Region {:?}: exit through {} (epoch {})", self.id, direction, epoch);
                if let Some(on_exit) = &self.callbacks.on_exit {
                    on_exit(direction);
                }
                self.run_exit(epoch, direction, handlers);
            }
        }
    }

    fn run_entry(self: &Arc<Self>, epoch: u64, direction: EntryDirection, batch: HandlerBatch<EntryDirection>) {
        let joined = fan_out(&batch, direction);
        let region = Arc::downgrade(self);
        let join = self.runtime.spawn(async move {
            joined.await;
            if let Some(region) = region.upgrade() {
                region.complete_entry(epoch);
            }
        });
        self.lock().track_join(join.abort_handle());
    }

    fn run_exit(self: &Arc<Self>, epoch: u64, direction: ExitDirection, batch: HandlerBatch<ExitDirection>) {
        if batch.is_empty() {
            self.complete_exit(epoch);
            return;
        }

        let joined = fan_out(&batch, direction);
        let region = Arc::downgrade(self);
        let join = self.runtime.spawn(async move {
            joined.await;
            if let Some(region) = region.upgrade() {
                region.complete_exit(epoch);
            }
        });
        self.lock().track_join(join.abort_handle());
    }

    fn complete_entry(&self, epoch: u64) {
        let mut state = self.lock();
        if state.phase == RegionPhase::Active && state.epoch == epoch {
            state.entered = true;
            tracing::debug!("Region {:?}: entry handshake complete", self.id);
        } else {
            tracing::trace!("Region {:?}: stale entry completion (epoch {})", self.id, epoch);
        }
    }

    fn complete_exit(self: &Arc<Self>, epoch: u64) {
        let reentry = {
            let mut state = self.lock();
            if !state.finish_exit(epoch) {
                tracing::trace!("Region {:?}: stale exit completion (epoch {})", self.id, epoch);
                return;
            }
            tracing::debug!("Region {:?}: exit handshake complete, unmounting", self.id);
            self.sync_render(&state);

            let reentry = state.reevaluate();
            self.sync_render(&state);
            reentry
        };
        if let Some(edge) = reentry {
            self.run_edge(edge);
        }
    }

    fn register_entry(self: &Arc<Self>, handler: Handler<EntryDirection>) -> Registration {
        let (id, buffered) = {
            let mut state = self.lock();
            let id = state.entry_handlers.insert(handler.clone());
            (id, state.take_pending_entry())
        };

        if let Some((epoch, direction)) = buffered {
            tracing::debug!("Region {:?}: firing buffered entry {}", self.id, direction);
            self.run_entry(epoch, direction, smallvec![handler]);
        }

        Registration {
            region: Arc::downgrade(self),
            slot: HandlerSlot::Entry(id),
        }
    }

    fn register_exit(self: &Arc<Self>, handler: Handler<ExitDirection>) -> Registration {
        let id = self.lock().exit_handlers.insert(handler);
        Registration {
            region: Arc::downgrade(self),
            slot: HandlerSlot::Exit(id),
        }
    }
}

/// Shared handle to one keyframe region
///
/// Cloning the handle is cheap; every clone observes the same region.
#[derive(Clone)]
pub struct RegionHandle {
    shared: Arc<RegionShared>,
}

impl RegionHandle {
    pub(crate) fn new(
        id: RegionId,
        position: ScrollPosition,
        callbacks: RegionCallbacks,
        offset: f64,
        runtime: Handle,
    ) -> Self {
        let (render, _) = watch::channel(RenderState::default());
        Self {
            shared: Arc::new(RegionShared {
                id,
                state: Mutex::new(RegionState::new(position, offset)),
                callbacks,
                render,
                runtime,
            }),
        }
    }

    pub(crate) fn observe(&self, offset: f64) {
        self.shared.observe(offset);
    }

    /// Abort in-flight handshakes; used when the region is removed
    pub(crate) fn detach(&self) {
        let mut state = self.shared.lock();
        for join in state.joins.drain(..) {
            join.abort();
        }
    }

    pub fn id(&self) -> RegionId {
        self.shared.id
    }

    pub fn position(&self) -> ScrollPosition {
        self.shared.lock().position
    }

    pub fn phase(&self) -> RegionPhase {
        self.shared.lock().phase
    }

    /// Whether the last observed offset fell inside the region
    pub fn is_active(&self) -> bool {
        self.phase() == RegionPhase::Active
    }

    /// Whether the region's content should be mounted
    pub fn should_render(&self) -> bool {
        self.shared.lock().should_render()
    }

    /// Whether every entry handler fired for this activation has completed
    pub fn is_entered(&self) -> bool {
        self.shared.lock().entered
    }

    /// Normalized progress within the region, `0.0` unless active
    pub fn progress(&self) -> f64 {
        let state = self.shared.lock();
        if state.phase == RegionPhase::Active {
            state.position.progress(state.offset)
        } else {
            0.0
        }
    }

    pub fn scroll_offset(&self) -> f64 {
        self.shared.lock().offset
    }

    pub fn entry_direction(&self) -> EntryDirection {
        self.shared.lock().entry_direction
    }

    pub fn exit_direction(&self) -> ExitDirection {
        self.shared.lock().exit_direction
    }

    pub fn entry_handler_count(&self) -> usize {
        self.shared.lock().entry_handlers.len()
    }

    pub fn exit_handler_count(&self) -> usize {
        self.shared.lock().exit_handlers.len()
    }

    /// Watch mount/unmount decisions
    pub fn subscribe_render(&self) -> watch::Receiver<RenderState> {
        self.shared.render.subscribe()
    }

    /// Register an async entry handler
    ///
    /// If the region became active before any entry handler existed, the
    /// buffered direction is delivered to the first handler registered, and
    /// only to that one.
    pub fn register_entry_handler<F, Fut>(&self, handler: F) -> Registration
    where
        F: Fn(EntryDirection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.shared.register_entry(erase_async(handler))
    }

    /// Register an async exit handler
    pub fn register_exit_handler<F, Fut>(&self, handler: F) -> Registration
    where
        F: Fn(ExitDirection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.shared.register_exit(erase_async(handler))
    }

    /// Register an entry animation that reports back through a [`Completion`]
    pub fn register_directional_entry<F>(&self, animation: F) -> Registration
    where
        F: Fn(EntryDirection, Completion) + Send + Sync + 'static,
    {
        self.shared.register_entry(erase_directional(animation))
    }

    /// Register an exit animation that reports back through a [`Completion`]
    pub fn register_directional_exit<F>(&self, animation: F) -> Registration
    where
        F: Fn(ExitDirection, Completion) + Send + Sync + 'static,
    {
        self.shared.register_exit(erase_directional(animation))
    }
}

impl fmt::Debug for RegionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("RegionHandle")
            .field("id", &self.shared.id)
            .field("position", &state.position)
            .field("phase", &state.phase)
            .field("offset", &state.offset)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HandlerSlot {
    Entry(HandlerId),
    Exit(HandlerId),
}

/// Token returned by handler registration
///
/// Unregistering stops the handler from being called on future edges; an
/// edge already in flight still waits for it.
pub struct Registration {
    region: Weak<RegionShared>,
    slot: HandlerSlot,
}

impl Registration {
    /// Remove the handler from its region
    ///
    /// Safe to call any number of times, and after the region is gone.
    pub fn unregister(&self) {
        let Some(region) = self.region.upgrade() else {
            return;
        };
        let mut state = region.lock();
        match self.slot {
            HandlerSlot::Entry(id) => state.entry_handlers.remove(id),
            HandlerSlot::Exit(id) => state.exit_handlers.remove(id),
        };
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("slot", &self.slot)
            .field("region_alive", &(self.region.strong_count() > 0))
            .finish()
    }
}
