//! Clock capability: where "now" comes from.
//!
//! Production uses `SystemClock`; the simulation driver and tests use
//! `SimulatedClock`, which only moves when explicitly advanced.

use std::cell::Cell;

use chrono::{DateTime, SubsecRound, Utc};

use crate::interval::Interval;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock, truncated to whole seconds (API timestamps carry no fraction).
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}

#[derive(Debug)]
pub struct SimulatedClock {
    base: DateTime<Utc>,
    now: Cell<DateTime<Utc>>,
}

impl SimulatedClock {
    pub fn new(base: DateTime<Utc>) -> Self {
        Self {
            base,
            now: Cell::new(base),
        }
    }

    /// Move the clock forward. Negative steps are ignored.
    pub fn advance(&self, by: Interval) {
        if by.is_positive() {
            self.now.set(self.now.get() + by.as_duration());
        }
    }

    pub fn base(&self) -> DateTime<Utc> {
        self.base
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.now.get() - self.base
    }
}

impl Clock for SimulatedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
