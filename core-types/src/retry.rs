// Copyright (c) James Kassemi, SC, US. All rights reserved.
use rand::Rng;
use std::thread::sleep;
use std::time::Duration;

/// Jittered exponential backoff for idempotent storage reads.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_pct: f64,
}

impl RetryPolicy {
    /// Out-of-range inputs are clamped: at least one attempt and 1ms, jitter within 0..=1.
    pub fn new(max_attempts: usize, base_delay_ms: u64, max_delay_ms: u64, jitter_pct: f64) -> Self {
        let base_delay_ms = base_delay_ms.max(1);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
        }
    }

    fn next_delay(&self, attempt: usize) -> Duration {
        let backoff = self
            .base_delay_ms
            .saturating_mul(2_u64.saturating_pow(attempt as u32))
            .min(self.max_delay_ms);
        if self.jitter_pct <= 0.0 {
            return Duration::from_millis(backoff);
        }
        let spread = (backoff as f64 * self.jitter_pct) as i64;
        let delta = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_millis(backoff.saturating_add_signed(delta))
    }

    /// Runs `op` until it succeeds, `should_retry` rejects the error, or attempts run out.
    pub fn retry_blocking<T, E, F, P>(&self, mut op: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut(usize) -> Result<T, E>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(val) => return Ok(val),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !should_retry(&err) {
                        return Err(err);
                    }
                    let delay = self.next_delay(attempt - 1);
                    log::debug!("retrying read in {:?} (attempt {attempt})", delay);
                    sleep(delay);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 50, 1_000, 0.2)
    }
}
