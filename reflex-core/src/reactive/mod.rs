//! Reactive Primitives
//!
//! This module implements the core reactive system: the dependency store,
//! effects, computed values, watchers and the job scheduler. Together with
//! the wrappers in [`crate::proxy`] they form Reflex's fine-grained
//! reactivity.
//!
//! # Concepts
//!
//! ## Effects
//!
//! An Effect is a computation that re-runs whenever something it read
//! changes. Before each run it drops its old dependencies, so a branch that
//! is no longer taken stops triggering it. An effect lives as long as its
//! handle; the runtime itself only holds it weakly.
//!
//! ## Computed values
//!
//! A Computed is a derived value that caches its result. It is marked dirty
//! when a dependency changes and recomputes only when read again.
//!
//! ## Watchers
//!
//! A watcher calls back with the new and old value of a getter, or whenever
//! anything reachable from a wrapper changes.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local context stack to detect
//! dependencies automatically. When a wrapped target is read, we check if
//! there is a running computation and, if so, subscribe it to the (target,
//! key) pair that was read.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod computed;
mod context;
mod effect;
mod runtime;
mod scheduler;
mod subscriber;
mod watch;

pub use computed::{computed, Computed};
pub use context::{pause_tracking, untracked, ReactiveContext, TrackingPause};
pub use effect::{create_effect, Effect, EffectOptions, EffectRef, Scheduler, WeakEffect};
pub use runtime::{ChangeKind, Key, Runtime, Target, Trigger};
pub use scheduler::{flush_jobs, pending_jobs, queue_job, queue_microtask, tick, Job};
pub use subscriber::{SubscriberId, TargetId};
pub use watch::{watch, watch_target, FlushMode, OnInvalidate, WatchHandle, WatchOptions};
