//! Reflex Core
//!
//! This crate provides a fine-grained reactive state-tracking runtime. It
//! implements:
//!
//! - Reactive wrappers over records, sequences, sets, ordered maps and boxes
//! - Automatic dependency tracking with per-key granularity
//! - Effects with scheduling, cleanup and lazy evaluation
//! - Lazily recomputed derived values and deep or getter-based watchers
//! - A deduplicating job queue flushed at an explicit host boundary
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: dependency store, effects, computed values, watchers and the
//!   scheduler
//! - `proxy`: raw objects, dynamic values and the wrappers that intercept
//!   reads and writes
//! - `error`: refusals reported by writes
//!
//! All runtime state is thread-local. Nothing here is `Send`.
//!
//! # Example
//!
//! ```rust,ignore
//! use reflex_core::{create_effect, reactive, EffectOptions, Object};
//!
//! // Wrap some state
//! let state = reactive(&Object::record([("count", 0)]));
//!
//! // Create an effect; it reacts for as long as the handle is held
//! let reader = state.clone();
//! let _effect = create_effect(
//!     move || println!("Count: {:?}", reader.get("count")),
//!     EffectOptions::default(),
//! );
//!
//! // Update the state
//! state.set("count", 5)?;
//! // Effect automatically runs, prints: "Count: 5"
//! ```

pub mod error;
pub mod proxy;
pub mod reactive;

pub use error::{ReactiveError, Result};
pub use proxy::{
    box_all, box_property, boxed, is_reactive, is_readonly, reactive, readonly,
    shallow_reactive, shallow_readonly, to_raw, unwrap_proxy, wrap, Object, Reactive, TargetKind,
    UnwrapProxy, Value, WrapOptions, RAW_KEY,
};
pub use reactive::{
    computed, create_effect, queue_job, queue_microtask, tick, watch, watch_target, Computed,
    Effect, EffectOptions, FlushMode, OnInvalidate, WatchHandle, WatchOptions,
};
