//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a wrapped target is read,
//! we can subscribe the current computation to that (target, key) pair.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When a computation runs, it pushes itself onto the stack. When it
//! completes, the guard pops it and the previous computation becomes current
//! again. This supports nested computations: an effect created inside another
//! effect gets its own entry, so the inner reads are never attributed to the
//! outer one.
//!
//! Tracking can additionally be suspended with [`pause_tracking`]. Running a
//! computation always re-enables tracking for its own duration.

use std::cell::{Cell, RefCell};

use super::effect::EffectRef;
use super::SubscriberId;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    effect: EffectRef,
    /// Tracking state to restore once this computation finishes.
    prev_should_track: bool,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given computation.
    ///
    /// While this context is active, reads of wrapped targets subscribe the
    /// computation. The context is exited when the returned guard is dropped.
    pub fn enter(effect: EffectRef) -> Self {
        let subscriber_id = effect.id();
        let prev_should_track = SHOULD_TRACK.with(|t| t.replace(true));
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                effect,
                prev_should_track,
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Whether a read right now would be tracked.
    pub fn is_tracking() -> bool {
        SHOULD_TRACK.with(Cell::get) && Self::is_active()
    }

    /// The computation currently executing, if any.
    pub fn current() -> Option<EffectRef> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.effect.clone()))
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.effect.id()))
    }

    /// Nesting depth of running computations.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.effect.id(),
                    self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id,
                    entry.effect.id()
                );
                SHOULD_TRACK.with(|t| t.set(entry.prev_should_track));
            }
        });
    }
}

/// Guard returned by [`pause_tracking`]; restores the previous tracking
/// state when dropped.
pub struct TrackingPause {
    prev: bool,
}

/// Suspend dependency tracking until the guard is dropped.
///
/// Reads made while paused do not subscribe the current computation. Nested
/// pauses restore correctly in LIFO order.
pub fn pause_tracking() -> TrackingPause {
    TrackingPause {
        prev: SHOULD_TRACK.with(|t| t.replace(false)),
    }
}

impl Drop for TrackingPause {
    fn drop(&mut self) {
        SHOULD_TRACK.with(|t| t.set(self.prev));
    }
}

/// Run `f` with tracking suspended.
pub fn untracked<T>(f: impl FnOnce() -> T) -> T {
    let _pause = pause_tracking();
    f()
}
