//! Enter/exit handshake primitives
//!
//! Mounted content registers handlers with a region. On an activation edge
//! the region calls every handler with the edge's direction and joins the
//! resulting futures; the edge is complete only once all of them resolve.
//!
//! Two handler shapes are supported:
//!
//! - async handlers, `Fn(direction) -> impl Future<Output = ()>`
//! - directional handlers, `Fn(direction, Completion)`, for animation systems
//!   that report completion through a callback
//!
//! ```ignore
//! region.register_directional_exit(|direction, done| {
//!     animate_out(direction, move || done.complete());
//! });
//! ```

use futures::future::{join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;

/// One-shot completion callback handed to directional handlers
///
/// Call [`Completion::complete`] when the animation has finished. Dropping
/// the completion without calling it also releases the handshake, with a
/// warning; holding on to it forever keeps the edge pending.
#[derive(Debug)]
#[must_use = "the handshake stays pending until `complete()` is called"]
pub struct Completion {
    sender: oneshot::Sender<()>,
}

impl Completion {
    /// Create a completion and the future that resolves with it
    pub fn pair() -> (Completion, impl Future<Output = ()> + Send + 'static) {
        let (sender, receiver) = oneshot::channel();
        let done = async move {
            if receiver.await.is_err() {
                tracing::warn!("Completion dropped without calling complete()");
            }
        };
        (Completion { sender }, done)
    }

    pub fn complete(self) {
        // The joining task may already be gone (region removed)
        let _ = self.sender.send(());
    }
}

/// Identifier of a registered handler within one region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Type-erased async handler
pub(crate) type Handler<D> = Arc<dyn Fn(D) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handlers snapshotted for one edge
pub(crate) type HandlerBatch<D> = SmallVec<[Handler<D>; 4]>;

/// Wrap an async handler into the erased form
pub(crate) fn erase_async<D, F, Fut>(handler: F) -> Handler<D>
where
    D: Send + 'static,
    F: Fn(D) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |direction| handler(direction).boxed())
}

/// Wrap a directional (callback-completing) handler into the erased form
pub(crate) fn erase_directional<D, F>(animation: F) -> Handler<D>
where
    D: Send + 'static,
    F: Fn(D, Completion) + Send + Sync + 'static,
{
    Arc::new(move |direction| {
        let (completion, done) = Completion::pair();
        animation(direction, completion);
        done.boxed()
    })
}

/// Start every handler of a batch and join them
///
/// Handlers are invoked immediately, in registration order; the returned
/// future resolves once all of them have.
pub(crate) fn fan_out<D: Copy>(batch: &[Handler<D>], direction: D) -> impl Future<Output = ()> {
    let started: Vec<BoxFuture<'static, ()>> =
        batch.iter().map(|handler| handler(direction)).collect();
    join_all(started).map(|_| ())
}

/// Ordered set of handlers for one edge kind
pub(crate) struct HandlerSet<D> {
    next_id: u64,
    handlers: IndexMap<HandlerId, Handler<D>>,
}

impl<D> HandlerSet<D> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            handlers: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, handler: Handler<D>) -> HandlerId {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.insert(id, handler);
        id
    }

    /// Remove a handler; returns false if it was already gone
    pub fn remove(&mut self, id: HandlerId) -> bool {
        self.handlers.shift_remove(&id).is_some()
    }

    pub fn snapshot(&self) -> HandlerBatch<D> {
        self.handlers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::direction::EntryDirection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_handler_set_keeps_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut set: HandlerSet<EntryDirection> = HandlerSet::new();

        let mut ids = Vec::new();
        for index in 0..3 {
            let order = order.clone();
            ids.push(set.insert(erase_async(move |_| {
                order.lock().unwrap().push(index);
                async {}
            })));
        }

        assert!(set.remove(ids[1]));
        assert!(!set.remove(ids[1]));
        assert_eq!(set.len(), 2);

        let batch = set.snapshot();
        futures::executor::block_on(fan_out(&batch, EntryDirection::Top));
        assert_eq!(*order.lock().unwrap(), vec![0, 2]);
    }

    #[tokio::test]
    async fn test_fan_out_waits_for_every_completion() {
        let held = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut set: HandlerSet<EntryDirection> = HandlerSet::new();
        for _ in 0..2 {
            let held = held.clone();
            let calls = calls.clone();
            set.insert(erase_directional(move |direction, done| {
                assert_eq!(direction, EntryDirection::Bottom);
                calls.fetch_add(1, Ordering::SeqCst);
                held.lock().unwrap().push(done);
            }));
        }

        let joined = tokio::spawn(fan_out(&set.snapshot(), EntryDirection::Bottom));
        // Both handlers start before anything is awaited
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let first = held.lock().unwrap().pop().unwrap();
        first.complete();
        tokio::task::yield_now().await;
        assert!(!joined.is_finished());

        let second = held.lock().unwrap().pop().unwrap();
        second.complete();
        joined.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_completion_releases_join() {
        let mut set: HandlerSet<EntryDirection> = HandlerSet::new();
        set.insert(erase_directional(|_, done: Completion| drop(done)));

        fan_out(&set.snapshot(), EntryDirection::Top).await;
    }
}
