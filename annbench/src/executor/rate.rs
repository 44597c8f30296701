//! Token-bucket pacing for a target query rate.
//!
//! A governor task adds tokens to a shared [`Semaphore`] every `tick`. A worker
//! takes one token per query after claiming its index and before starting the
//! timer, so waiting for a token never counts as query latency.
//!
//! Tokens per tick are computed as
//!
//! ```text
//! add_f = rate * tick_seconds
//! add_total = floor(add_f + fractional)
//! fractional = (add_f + fractional) - add_total
//! ```
//!
//! Carrying `fractional` across ticks keeps the long-run average equal to `rate`
//! even when `rate * tick` is not a whole number.
use std::{sync::Arc, time::Duration};

use tokio::sync::{Semaphore, watch::Receiver};

/// The semaphore reserves 3 bits of usize for flags.
pub const MAX_TOKENS: u64 = (usize::MAX >> 3) as u64;

/// Pure function returning the tokens to add this tick and the carried fraction.
pub fn calc_token_limit(rate: f64, fractional: f64, tick: Duration) -> (u64, f64) {
    let add_f = (rate * tick.as_secs_f64()).max(0.0);
    let carried = add_f + fractional;
    let add_total = carried.floor();
    if add_total >= MAX_TOKENS as f64 {
        return (MAX_TOKENS, 0.0);
    }
    (add_total as u64, carried - add_total)
}

/// Bucket size: enough for one tick's worth of tokens, and at least one per worker.
pub fn bucket_capacity(rate: f64, tick: Duration, workers: usize) -> usize {
    let per_tick = (rate * tick.as_secs_f64()).ceil();
    let per_tick = if per_tick >= MAX_TOKENS as f64 {
        MAX_TOKENS as usize
    } else {
        per_tick as usize
    };
    per_tick.max(workers).max(1)
}

/// Feeds `tokens` at `rate` per second until `shutdown` flips to true.
pub async fn token_governor_task(
    tokens: Arc<Semaphore>,
    rate: f64,
    tick: Duration,
    capacity: usize,
    mut shutdown: Receiver<bool>,
) {
    let main_task = async {
        let mut fractional = 0.0;
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            let (add_total, f) = calc_token_limit(rate, fractional, tick);
            fractional = f;
            let avail = tokens.available_permits();
            if add_total > 0 && avail < capacity {
                let free_cap = (capacity - avail) as u64;
                let add = add_total.min(free_cap) as usize;
                tracing::trace!(avail, add, "adding tokens");
                tokens.add_permits(add);
            }
        }
    };

    tokio::select! {
        _ = main_task => {}
        _ = shutdown.wait_for(|done| *done) => {}
    };
}
