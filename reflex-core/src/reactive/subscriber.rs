//! Identifiers for the two sides of the dependency graph.
//!
//! A [`SubscriberId`] names a computation (effect, computed value or watcher)
//! and a [`TargetId`] names something that can be read from: a raw object or
//! the synthetic target of a computed value.

use std::cell::Cell;
use std::fmt;

thread_local! {
    static NEXT_SUBSCRIBER: Cell<u64> = const { Cell::new(0) };
    static NEXT_TARGET: Cell<u64> = const { Cell::new(0) };
}

fn next(counter: &'static std::thread::LocalKey<Cell<u64>>) -> u64 {
    counter.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    })
}

/// Unique identifier for a subscriber.
///
/// Each computation gets an ID when created. The ID is what dependency sets
/// are keyed by, so subscribing the same computation twice is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// The runtime is thread-local, so IDs only need to be unique per thread.
    pub fn new() -> Self {
        Self(next(&NEXT_SUBSCRIBER))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a trackable target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    pub fn new() -> Self {
        Self(next(&NEXT_TARGET))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn target_ids_increase() {
        let a = TargetId::new();
        let b = TargetId::new();
        assert!(b.raw() > a.raw());
        assert_eq!(format!("{:?}", a), format!("#{}", a.raw()));
    }
}
