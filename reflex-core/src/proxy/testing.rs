//! Helpers shared by the wrapper tests.

use std::cell::Cell;
use std::rc::Rc;

use crate::reactive::{create_effect, Effect, EffectOptions};

/// An effect that counts its runs. The effect lives as long as this value.
pub(crate) struct Runs {
    count: Rc<Cell<u32>>,
    _effect: Effect<()>,
}

impl Runs {
    pub(crate) fn get(&self) -> u32 {
        self.count.get()
    }
}

pub(crate) fn count_runs(f: impl Fn() + 'static) -> Runs {
    let count = Rc::new(Cell::new(0));
    let counter = count.clone();
    let effect = create_effect(
        move || {
            counter.set(counter.get() + 1);
            f();
        },
        EffectOptions::default(),
    );
    Runs {
        count,
        _effect: effect,
    }
}
