use std::hint::black_box;
use std::thread;
use std::time::{Duration, Instant};

use crate::stop_signal::StopSignal;

/// Base length of one burst-then-sleep tick at 100% speed.
pub const TICK_BASE: Duration = Duration::from_millis(10);

/// Burn cycles per tick at 100% max usage.
const CYCLES_PER_TICK: u64 = 10_000;

/// Runs one worker's paced burn loop until the deadline passes or the shared
/// stop signal is observed.
///
/// Each tick burns `CYCLES_PER_TICK * max_usage / 100` cycles, then sleeps
/// out whatever remains of the tick budget. `speed_factor` widens the budget
/// (`TICK_BASE * 100 / speed_factor`) without shrinking the burst, so it
/// controls the compute/idle ratio rather than raw speed. When the burst
/// alone exceeds the budget no sleep happens at all, which is how high
/// settings reach a near-100% duty cycle.
///
/// The stop condition is only checked at tick boundaries; worst-case stop
/// latency is one burst plus one sleep.
pub fn run(max_usage: u32, speed_factor: u32, signal: &StopSignal, deadline: Instant) {
    let sleep_budget = TICK_BASE * 100 / speed_factor.clamp(1, 100);
    let cycles = CYCLES_PER_TICK * u64::from(max_usage.min(100)) / 100;

    while Instant::now() < deadline && !signal.is_set() {
        let start = Instant::now();
        for _ in 0..cycles {
            // black_box keeps the kernel from being folded to a constant.
            black_box((0..100u64).fold(0u64, |acc, i| acc.wrapping_add(i.wrapping_mul(i))));
        }
        let elapsed = start.elapsed();
        if elapsed < sleep_budget {
            thread::sleep(sleep_budget - elapsed);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn stops_at_the_deadline() {
        let signal = StopSignal::new().unwrap();
        let deadline = Instant::now() + Duration::from_millis(100);
        let start = Instant::now();
        run(10, 100, &signal, deadline);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(90), "exited early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "overran the deadline: {elapsed:?}");
    }

    #[test]
    fn returns_immediately_when_the_signal_is_already_set() {
        let signal = StopSignal::new().unwrap();
        signal.set();
        let start = Instant::now();
        run(100, 100, &signal, Instant::now() + Duration::from_secs(60));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn observes_the_signal_within_a_tick() {
        let signal = Arc::new(StopSignal::new().unwrap());
        let worker_signal = Arc::clone(&signal);
        let worker = thread::spawn(move || {
            run(50, 50, &worker_signal, Instant::now() + Duration::from_secs(60));
        });

        thread::sleep(Duration::from_millis(50));
        signal.set();
        let observed = Instant::now();
        worker.join().unwrap();
        assert!(observed.elapsed() < Duration::from_secs(1));
    }
}
