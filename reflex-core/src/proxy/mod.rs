//! Instrumentation Layer
//!
//! Raw data lives in [`Object`]s: records, sequences, sets, ordered maps and
//! boxes. Wrapping an object in a [`Reactive`] makes every read through the
//! wrapper a tracked dependency and every write a notification.
//!
//! # Wrapper flavors
//!
//! - [`reactive`]: deep; nested objects are wrapped on access
//! - [`shallow_reactive`]: only top-level keys are reactive
//! - [`readonly`]: writes are refused, reads do not track
//! - [`shallow_readonly`]: both
//!
//! Each flavor has one canonical wrapper per object while the wrapper is
//! alive, so `reactive(&o)` called twice returns the same handle.

mod boxed;
mod collections;
mod object;
mod sequence;
#[cfg(test)]
pub(crate) mod testing;
mod value;
mod wrapper;

pub use boxed::{box_all, box_property, boxed, unwrap_proxy, UnwrapProxy};
pub use object::{BoxSlot, Object, ObjectData, Record, TargetKind};
pub use sequence::MAX_LENGTH;
pub use value::Value;
pub use wrapper::{
    is_reactive, is_readonly, reactive, readonly, shallow_reactive, shallow_readonly, to_raw,
    wrap, Reactive, WrapOptions, LENGTH, RAW_KEY,
};
