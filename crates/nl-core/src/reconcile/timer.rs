//! Jittered resync timer.

use rand::Rng;
use std::time::Duration;
use tokio::sync::watch;

/// `base` stretched by a random fraction of `factor * base`.
///
/// A non-positive factor disables jitter. Saturates at `Duration::MAX`
/// instead of overflowing.
pub fn jittered(base: Duration, factor: f64) -> Duration {
    if factor <= 0.0 || !factor.is_finite() {
        return base;
    }
    let fraction: f64 = rand::rng().random();
    let extra = Duration::try_from_secs_f64(base.as_secs_f64() * fraction * factor)
        .unwrap_or(Duration::MAX);
    base.saturating_add(extra)
}

/// Call `tick` immediately and then once per jittered period until `stop`
/// turns true or its sender goes away.
///
/// The next period is drawn after `tick` returns, so a slow tick pushes the
/// schedule back rather than causing a burst.
pub async fn run_jittered<F>(interval: Duration, factor: f64, mut stop: watch::Receiver<bool>, mut tick: F)
where
    F: FnMut(),
{
    loop {
        if *stop.borrow() {
            return;
        }
        tick();
        let delay = jittered(interval, factor);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    return;
                }
            }
        }
    }
}
