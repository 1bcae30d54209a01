//! Simulation clock with configurable speed multiplier.
//!
//! Maps wall-clock monotonic time to simulated time under a speed multiple
//! (1x real-time up to 60x and beyond). Supports pause/resume and speed
//! change without discontinuities: the live delta is folded into an
//! accumulator on every transition, so elapsed sim time never steps back.
//!
//! All movement strategies and domain simulators query this clock rather
//! than the wall clock.

use std::sync::Mutex;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};

struct ClockInner {
    speed: f64,
    running: bool,
    wall_start: Option<Instant>,
    accumulated_sim: Duration,
}

impl ClockInner {
    fn elapsed(&self) -> Duration {
        match (self.running, self.wall_start) {
            (true, Some(wall_start)) => {
                let wall_s = wall_start.elapsed().as_secs_f64();
                let live = Duration::microseconds((wall_s * self.speed * 1e6) as i64);
                self.accumulated_sim + live
            }
            _ => self.accumulated_sim,
        }
    }
}

/// Thread-safe simulation clock.
///
/// Every method takes `&self`; state transitions are atomic under one
/// internal mutex. Queried before `start()`, elapsed time is zero.
pub struct SimulationClock {
    start_time: DateTime<Utc>,
    inner: Mutex<ClockInner>,
}

impl SimulationClock {
    pub fn new(start_time: DateTime<Utc>, speed: f64) -> Self {
        Self {
            start_time,
            inner: Mutex::new(ClockInner {
                speed,
                running: false,
                wall_start: None,
                accumulated_sim: Duration::zero(),
            }),
        }
    }

    /// The simulation epoch (scenario start).
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn speed(&self) -> f64 {
        self.lock().speed
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Begin advancing time. No-op if already running.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.running {
            return;
        }
        inner.running = true;
        inner.wall_start = Some(Instant::now());
    }

    /// Pause time advancement, folding the live delta into the accumulator.
    pub fn pause(&self) {
        let mut inner = self.lock();
        if !inner.running {
            return;
        }
        inner.accumulated_sim = inner.elapsed();
        inner.running = false;
        inner.wall_start = None;
    }

    /// Resume from paused state. No-op if already running.
    pub fn resume(&self) {
        self.start();
    }

    /// Reset elapsed time to zero. Leaves the clock paused.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.running = false;
        inner.wall_start = None;
        inner.accumulated_sim = Duration::zero();
    }

    /// Change the speed multiplier. Elapsed time accrued at the old speed
    /// is folded in first, so the change never rewinds sim time.
    pub fn set_speed(&self, multiplier: f64) {
        let mut inner = self.lock();
        if inner.running {
            inner.accumulated_sim = inner.elapsed();
            inner.wall_start = Some(Instant::now());
        }
        inner.speed = multiplier;
    }

    /// Elapsed simulation time since start.
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed()
    }

    /// Current simulation datetime.
    pub fn sim_time(&self) -> DateTime<Utc> {
        self.start_time + self.elapsed()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockInner> {
        // The mutex protects only plain state; a poisoned lock means a
        // panicked thread already violated an invariant elsewhere.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;

    fn epoch() -> DateTime<Utc> {
        chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 4, 15, 8, 0, 0).unwrap()
    }

    #[test]
    fn elapsed_is_zero_before_start() {
        let clock = SimulationClock::new(epoch(), 10.0);
        assert_eq!(clock.elapsed(), Duration::zero());
        assert_eq!(clock.sim_time(), epoch());
    }

    #[test]
    fn elapsed_advances_with_speed_multiplier() {
        let clock = SimulationClock::new(epoch(), 60.0);
        clock.start();
        sleep(StdDuration::from_millis(100));
        let elapsed = clock.elapsed();
        // 100ms wall at 60x is ~6s sim; allow generous scheduling slack.
        assert!(elapsed >= Duration::seconds(5), "elapsed = {elapsed}");
        assert!(elapsed <= Duration::seconds(30), "elapsed = {elapsed}");
    }

    #[test]
    fn pause_freezes_and_resume_continues() {
        let clock = SimulationClock::new(epoch(), 1.0);
        clock.start();
        sleep(StdDuration::from_millis(50));
        clock.pause();
        let at_pause = clock.elapsed();
        sleep(StdDuration::from_millis(100));
        assert_eq!(clock.elapsed(), at_pause);
        clock.resume();
        sleep(StdDuration::from_millis(50));
        assert!(clock.elapsed() > at_pause);
    }

    #[test]
    fn speed_change_preserves_continuity() {
        let clock = SimulationClock::new(epoch(), 1.0);
        clock.start();
        sleep(StdDuration::from_millis(100));
        let before = clock.elapsed();
        clock.set_speed(10.0);
        let after = clock.elapsed();
        assert!(after >= before, "speed change stepped back");
        sleep(StdDuration::from_millis(100));
        let final_elapsed = clock.elapsed();
        // ~0.1s at 1x plus ~0.1s at 10x: at least 1.0s, bounded above.
        assert!(final_elapsed >= Duration::milliseconds(1000));
        assert!(final_elapsed <= Duration::milliseconds(3000));
    }

    #[test]
    fn speed_change_while_paused_keeps_elapsed() {
        let clock = SimulationClock::new(epoch(), 1.0);
        clock.start();
        sleep(StdDuration::from_millis(50));
        clock.pause();
        let at_pause = clock.elapsed();
        clock.set_speed(60.0);
        assert_eq!(clock.elapsed(), at_pause);
    }

    #[test]
    fn reset_zeroes_and_leaves_paused() {
        let clock = SimulationClock::new(epoch(), 5.0);
        clock.start();
        sleep(StdDuration::from_millis(20));
        clock.reset();
        assert!(!clock.is_running());
        assert_eq!(clock.elapsed(), Duration::zero());
    }

    #[test]
    fn sim_time_is_monotonic() {
        let clock = SimulationClock::new(epoch(), 10.0);
        clock.start();
        let mut prev = clock.sim_time();
        for _ in 0..50 {
            let now = clock.sim_time();
            assert!(now >= prev);
            prev = now;
        }
    }
}
