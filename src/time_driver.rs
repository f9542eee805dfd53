//! Scaled embassy-time driver.
//!
//! Virtual time advances at `speed_percent` of wall-clock time, so a headless
//! run of many 1 Hz ticks does not have to take minutes. Registered timers
//! live next to the clock under one lock and a background thread wakes them
//! once their virtual deadline has passed.

use core::task::Waker;
use embassy_time_driver::{Driver, TICK_HZ, time_driver_impl};
use std::sync::{Condvar, Mutex, MutexGuard, Once, OnceLock, PoisonError};
use std::time::{Duration, Instant as StdInstant};

/// Accepted speed range in percent.
pub const MIN_SPEED_PERCENT: u32 = 1;
pub const MAX_SPEED_PERCENT: u32 = 100_000;

struct SimClock {
    /// Wall-clock instant at which virtual time read `origin_ticks`.
    origin_real: StdInstant,
    origin_ticks: u64,
    percent: u32,
    timers: Vec<(u64, Waker)>,
}

impl SimClock {
    /// Virtual ticks per wall-clock second.
    fn rate(&self) -> f64 {
        TICK_HZ as f64 * self.percent as f64 / 100.0
    }

    fn ticks_at(&self, real: StdInstant) -> u64 {
        let elapsed = real.saturating_duration_since(self.origin_real).as_secs_f64();
        self.origin_ticks.saturating_add((elapsed * self.rate()) as u64)
    }

    /// Wall-clock instant at which `ticks` is reached; `None` if unrepresentable.
    fn real_at(&self, ticks: u64) -> Option<StdInstant> {
        let ahead = ticks.saturating_sub(self.origin_ticks) as f64 / self.rate();
        let ahead = Duration::try_from_secs_f64(ahead).ok()?;
        self.origin_real.checked_add(ahead)
    }

    fn take_due(&mut self, now_ticks: u64) -> Vec<Waker> {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.timers).into_iter().partition(|(at, _)| *at <= now_ticks);
        self.timers = pending;
        due.into_iter().map(|(_, waker)| waker).collect()
    }
}

static CLOCK: OnceLock<Mutex<SimClock>> = OnceLock::new();
static TIMERS_CHANGED: Condvar = Condvar::new();
static TIMER_THREAD: Once = Once::new();

fn clock() -> MutexGuard<'static, SimClock> {
    CLOCK
        .get_or_init(|| {
            Mutex::new(SimClock {
                origin_real: StdInstant::now(),
                origin_ticks: 0,
                percent: 100,
                timers: Vec::new(),
            })
        })
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

fn run_timers() {
    let mut guard = clock();
    loop {
        let now = StdInstant::now();
        let now_ticks = guard.ticks_at(now);
        let due = guard.take_due(now_ticks);
        if !due.is_empty() {
            drop(guard);
            due.into_iter().for_each(Waker::wake);
            guard = clock();
            continue;
        }
        let next = guard.timers.iter().map(|(at, _)| *at).min();
        guard = match next.and_then(|at| guard.real_at(at)) {
            Some(deadline) => TIMERS_CHANGED.wait_timeout(guard, deadline.saturating_duration_since(now)).unwrap_or_else(PoisonError::into_inner).0,
            None => TIMERS_CHANGED.wait(guard).unwrap_or_else(PoisonError::into_inner),
        };
    }
}

struct SimDriver;

impl Driver for SimDriver {
    fn now(&self) -> u64 {
        clock().ticks_at(StdInstant::now())
    }

    fn schedule_wake(&self, at: u64, waker: &Waker) {
        TIMER_THREAD.call_once(|| {
            if let Err(e) = std::thread::Builder::new().name("sim-timers".into()).spawn(run_timers) {
                log::error!("Failed to start timer thread: {}", e);
            }
        });
        clock().timers.push((at, waker.clone()));
        TIMERS_CHANGED.notify_all();
    }
}

time_driver_impl!(static DRIVER: SimDriver = SimDriver);

/// Set the simulated-time speed, clamped to the accepted range.
///
/// Virtual time is rebased at the current instant, so it stays continuous
/// and only its rate changes.
pub fn set_speed_percent(percent: u32) {
    let percent = percent.clamp(MIN_SPEED_PERCENT, MAX_SPEED_PERCENT);
    {
        let mut c = clock();
        if c.percent == percent {
            return;
        }
        let now = StdInstant::now();
        c.origin_ticks = c.ticks_at(now);
        c.origin_real = now;
        c.percent = percent;
    }
    TIMERS_CHANGED.notify_all();
    log::debug!("Simulation speed set to {}%", percent);
}

pub fn speed_percent() -> u32 {
    clock().percent
}
