//! Utility functions and helpers

use rand::Rng;
use std::time::Duration;

/// Format amount with proper decimals
pub fn format_amount(amount: u64, decimals: u8) -> String {
    let value = amount as f64 / 10_f64.powi(decimals as i32);
    format!("{:.6}", value)
}

/// Signed change between two balance readings
pub fn balance_delta(before: u64, after: u64) -> i64 {
    (after as i128 - before as i128).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Exponential backoff for the n-th retry (1-based), capped, with up to 20% jitter
pub fn backoff_delay(retry: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = retry.saturating_sub(1).min(16);
    let delay = base_ms.saturating_mul(1u64 << exp).min(max_ms);
    let jitter = if delay >= 5 {
        rand::thread_rng().gen_range(0..=delay / 5)
    } else {
        0
    };
    Duration::from_millis(delay.saturating_add(jitter).min(max_ms))
}

/// Generate unique operation id
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
