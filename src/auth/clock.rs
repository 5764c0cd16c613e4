// src/auth/clock.rs

//! Injectable monotonic clock.
//!
//! Credential expiry is a lazy check against `Clock::now()` performed on
//! each acquire/validate call, not a background timer. Tests inject a
//! manual clock to step time deterministically.

use std::fmt::Debug;
use std::time::Instant;

/// Abstract monotonic time source.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;
}

/// Implementation that uses `std::time::Instant`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
