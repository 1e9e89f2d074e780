//! Effect Implementation
//!
//! An Effect is a re-runnable computation whose dependencies are tracked
//! automatically.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazy).
//!
//! 2. Each run first unsubscribes the effect from every dependency set it
//!    joined last time, then pushes the effect onto the context stack so
//!    reads during the run subscribe it again. Dependencies that are no
//!    longer read therefore stop triggering it.
//!
//! 3. When any dependency changes, the effect either re-runs synchronously
//!    or, if it has a scheduler, is handed to the scheduler, which decides
//!    when (or whether) to run it.
//!
//! # Handles
//!
//! [`Effect<T>`] is the typed runner returned to callers: running it
//! manually returns the function's result, which is how computed values and
//! watchers obtain their values. [`EffectRef`] is its untyped counterpart.
//!
//! Dependency sets only hold weak references. An effect lives as long as a
//! handle to it does; dropping the last handle unsubscribes it and releases
//! everything its closure captured, including the targets it reads.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::Dep;
use super::scheduler::Job;
use super::subscriber::SubscriberId;

/// Decides when a triggered effect runs. Receives the effect itself.
pub type Scheduler = Rc<dyn Fn(&EffectRef)>;

/// Options for [`create_effect`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    /// Do not run on creation; wait for a manual run.
    pub lazy: bool,
    /// Called instead of running the effect when a dependency changes.
    pub scheduler: Option<Scheduler>,
}

impl EffectOptions {
    pub fn lazy() -> Self {
        Self {
            lazy: true,
            scheduler: None,
        }
    }

    pub fn with_lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn with_scheduler(mut self, scheduler: impl Fn(&EffectRef) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .finish()
    }
}

pub struct EffectCore {
    id: SubscriberId,
    this: Weak<EffectCore>,
    body: Box<dyn Fn()>,
    /// Dependency sets joined during the last run.
    deps: RefCell<SmallVec<[Weak<Dep>; 4]>>,
    scheduler: Option<Scheduler>,
    disposed: Cell<bool>,
    run_count: Cell<usize>,
    job: OnceCell<Job>,
}

impl Drop for EffectCore {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl EffectCore {
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps.iter().filter_map(Weak::upgrade) {
            dep.borrow_mut().shift_remove(&self.id);
        }
    }

    fn run(&self) -> bool {
        if self.disposed.get() {
            return false;
        }
        let Some(this) = self.this.upgrade() else {
            return false;
        };

        self.cleanup();
        let _ctx = ReactiveContext::enter(EffectRef(this));
        (self.body)();
        self.run_count.set(self.run_count.get() + 1);
        true
    }
}

/// Untyped handle to an effect.
#[derive(Clone)]
pub struct EffectRef(Rc<EffectCore>);

impl EffectRef {
    pub fn id(&self) -> SubscriberId {
        self.0.id
    }

    /// Run the effect now, re-collecting its dependencies.
    ///
    /// Returns `false` if the effect has been disposed.
    pub fn run(&self) -> bool {
        self.0.run()
    }

    /// React to a dependency change: defer to the scheduler if there is one,
    /// otherwise run synchronously.
    pub fn trigger(&self) {
        match &self.0.scheduler {
            Some(scheduler) => scheduler(self),
            None => {
                self.run();
            }
        }
    }

    /// Stop the effect for good and unsubscribe it everywhere.
    pub fn dispose(&self) {
        if !self.0.disposed.replace(true) {
            self.0.cleanup();
            tracing::debug!(subscriber = ?self.0.id, "effect disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.0.disposed.get()
    }

    pub fn has_scheduler(&self) -> bool {
        self.0.scheduler.is_some()
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.0.run_count.get()
    }

    /// Get the number of dependency sets joined during the last run.
    pub fn dependency_count(&self) -> usize {
        self.0.deps.borrow().len()
    }

    /// A job that runs this effect.
    ///
    /// The same job is returned every time, so queueing it repeatedly
    /// before a flush runs the effect once.
    pub fn as_job(&self) -> Job {
        self.0
            .job
            .get_or_init(|| {
                let this = self.0.this.clone();
                Rc::new(move || {
                    if let Some(core) = this.upgrade() {
                        core.run();
                    }
                })
            })
            .clone()
    }

    pub fn ptr_eq(&self, other: &EffectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn record_dep(&self, dep: &Rc<Dep>) {
        self.0.deps.borrow_mut().push(Rc::downgrade(dep));
    }

    pub(crate) fn downgrade(&self) -> Subscription {
        Subscription(Rc::downgrade(&self.0))
    }
}

/// Entry of a dependency set. Does not keep the effect alive.
#[derive(Clone)]
pub(crate) struct Subscription(Weak<EffectCore>);

impl Subscription {
    pub(crate) fn upgrade(&self) -> Option<EffectRef> {
        self.0.upgrade().map(EffectRef)
    }
}

impl fmt::Debug for EffectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.0.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A typed runner returned by [`create_effect`].
///
/// The effect stops when the last clone of its handle is dropped.
///
/// # Example
///
/// ```rust,ignore
/// let state = reactive(&Object::record([("count", 0)]));
///
/// let effect = create_effect(
///     { let state = state.clone(); move || println!("count is {:?}", state.get("count")) },
///     EffectOptions::default(),
/// );
///
/// state.set("count", 5)?;  // Prints: "count is 5"
/// ```
#[must_use = "an effect stops as soon as its handle is dropped"]
pub struct Effect<T> {
    handle: EffectRef,
    output: Rc<RefCell<Option<T>>>,
}

impl<T: 'static> Effect<T> {
    /// Run the effect and return its function's result.
    ///
    /// Returns `None` once the effect has been disposed.
    pub fn run(&self) -> Option<T> {
        if self.handle.run() {
            self.output.borrow_mut().take()
        } else {
            None
        }
    }

    /// The untyped handle stored by the runtime.
    pub fn handle(&self) -> EffectRef {
        self.handle.clone()
    }

    pub fn id(&self) -> SubscriberId {
        self.handle.id()
    }

    pub fn dispose(&self) {
        self.handle.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }

    pub fn run_count(&self) -> usize {
        self.handle.run_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.handle.dependency_count()
    }

    /// A handle that does not keep the effect alive.
    pub fn downgrade(&self) -> WeakEffect<T> {
        WeakEffect {
            handle: Rc::downgrade(&self.handle.0),
            output: Rc::downgrade(&self.output),
        }
    }
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            output: Rc::clone(&self.output),
        }
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.handle.fmt(f)
    }
}

/// Weak counterpart of [`Effect`].
pub struct WeakEffect<T> {
    handle: Weak<EffectCore>,
    output: Weak<RefCell<Option<T>>>,
}

impl<T> WeakEffect<T> {
    pub fn upgrade(&self) -> Option<Effect<T>> {
        Some(Effect {
            handle: EffectRef(self.handle.upgrade()?),
            output: self.output.upgrade()?,
        })
    }
}

impl<T> Clone for WeakEffect<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            output: self.output.clone(),
        }
    }
}

/// Create an effect running `f`.
///
/// Unless `options.lazy` is set, `f` runs once before this returns. Keep the
/// returned handle for as long as the effect should react.
pub fn create_effect<T, F>(f: F, options: EffectOptions) -> Effect<T>
where
    T: 'static,
    F: Fn() -> T + 'static,
{
    let output: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&output);

    let core = Rc::new_cyclic(|this| EffectCore {
        id: SubscriberId::new(),
        this: this.clone(),
        body: Box::new(move || {
            let value = f();
            *slot.borrow_mut() = Some(value);
        }),
        deps: RefCell::new(SmallVec::new()),
        scheduler: options.scheduler,
        disposed: Cell::new(false),
        run_count: Cell::new(0),
        job: OnceCell::new(),
    });

    let effect = Effect {
        handle: EffectRef(core),
        output,
    };

    if !options.lazy {
        effect.run();
    }

    effect
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::{Object, TargetKind};
    use crate::reactive::{ChangeKind, Key, Runtime};

    fn counter() -> (Rc<Cell<i32>>, Rc<Cell<i32>>) {
        let c = Rc::new(Cell::new(0));
        (c.clone(), c)
    }

    #[test]
    fn effect_runs_on_creation() {
        let (run_count, run_count_clone) = counter();

        let _effect = create_effect(
            move || run_count_clone.set(run_count_clone.get() + 1),
            EffectOptions::default(),
        );

        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let (run_count, run_count_clone) = counter();

        let effect = create_effect(
            move || {
                run_count_clone.set(run_count_clone.get() + 1);
                run_count_clone.get() * 10
            },
            EffectOptions::lazy(),
        );

        assert_eq!(run_count.get(), 0);
        assert_eq!(effect.run_count(), 0);

        assert_eq!(effect.run(), Some(10));
        assert_eq!(run_count.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_does_not_run_after_disposal() {
        let (run_count, run_count_clone) = counter();

        let effect = create_effect(
            move || run_count_clone.set(run_count_clone.get() + 1),
            EffectOptions::default(),
        );
        assert_eq!(run_count.get(), 1);

        effect.dispose();
        assert!(effect.is_disposed());

        assert_eq!(effect.run(), None);
        effect.handle().trigger();
        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn effect_clone_shares_state() {
        let effect1 = create_effect(|| {}, EffectOptions::default());
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        assert_eq!(effect2.run_count(), 1);

        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.dispose();
        assert!(effect2.is_disposed());
    }

    #[test]
    fn scheduler_replaces_direct_run() {
        let target = Object::record([("a", 1)]);
        let (scheduled, scheduled_clone) = counter();

        let tracked = target.clone();
        let effect = create_effect(
            move || Runtime::track(&tracked, Key::prop("a")),
            EffectOptions::default().with_scheduler(move |_| {
                scheduled_clone.set(scheduled_clone.get() + 1);
            }),
        );
        assert_eq!(effect.run_count(), 1);

        Runtime::notify(target.id(), TargetKind::Record, Key::prop("a"), ChangeKind::Set, None);
        assert_eq!(scheduled.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn rerun_drops_unread_dependencies() {
        let target = Object::record([("a", 1), ("b", 2)]);
        let read_a = Rc::new(Cell::new(true));

        let tracked = target.clone();
        let flag = read_a.clone();
        let effect = create_effect(
            move || {
                let key = if flag.get() { "a" } else { "b" };
                Runtime::track(&tracked, Key::prop(key));
            },
            EffectOptions::default(),
        );
        assert_eq!(Runtime::subscriber_count(target.id(), &Key::prop("a")), 1);

        read_a.set(false);
        effect.run();
        assert_eq!(Runtime::subscriber_count(target.id(), &Key::prop("a")), 0);
        assert_eq!(Runtime::subscriber_count(target.id(), &Key::prop("b")), 1);
        assert_eq!(effect.dependency_count(), 1);
    }

    #[test]
    fn nested_effect_dependencies_stay_separate() {
        let target = Object::record([("outer", 1), ("inner", 2)]);
        let inner_slot: Rc<RefCell<Option<Effect<()>>>> = Rc::default();

        let tracked = target.clone();
        let slot = inner_slot.clone();
        let outer = create_effect(
            move || {
                let inner_target = tracked.clone();
                let inner = create_effect(
                    move || Runtime::track(&inner_target, Key::prop("inner")),
                    EffectOptions::default(),
                );
                *slot.borrow_mut() = Some(inner);
                Runtime::track(&tracked, Key::prop("outer"));
            },
            EffectOptions::default(),
        );

        assert_eq!(outer.dependency_count(), 1);
        let inner = inner_slot.borrow().clone().expect("inner effect created");
        assert_eq!(inner.dependency_count(), 1);
        assert_eq!(Runtime::subscriber_count(target.id(), &Key::prop("outer")), 1);
        assert_eq!(Runtime::subscriber_count(target.id(), &Key::prop("inner")), 1);
    }

    #[test]
    fn as_job_is_stable() {
        let effect = create_effect(|| {}, EffectOptions::lazy());
        let handle = effect.handle();
        assert!(Rc::ptr_eq(&handle.as_job(), &handle.as_job()));
        (handle.as_job())();
        assert_eq!(effect.run_count(), 1);
    }
}
