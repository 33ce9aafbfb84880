//! Hash-rate and confirmation statistics
//!
//! Hash attempts are accumulated into per-minute buckets held in a fixed
//! circular buffer covering the trailing window, so long runtimes never grow
//! the accounting state. Rates are point-in-time snapshots recomputed on
//! demand.

use std::time::{SystemTime, UNIX_EPOCH};

/// Trailing window covered by the hash-count buckets, in minutes
pub const WINDOW_MINUTES: u64 = 121;

/// Wall-clock minutes since the Unix epoch
pub fn minute_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        / 60
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    minute: u64,
    hashes: u64,
}

/// Circular per-minute hash-count buffer indexed by `minute % WINDOW_MINUTES`
///
/// A slot whose stored minute no longer matches is stale and is reset on the
/// next write to it; reads ignore stale slots.
#[derive(Debug)]
pub struct HashrateWindow {
    buckets: [Bucket; WINDOW_MINUTES as usize],
}

impl HashrateWindow {
    pub fn new() -> Self {
        Self {
            buckets: [Bucket::default(); WINDOW_MINUTES as usize],
        }
    }

    /// Add `hashes` attempts to the bucket for `minute`.
    pub fn record(&mut self, minute: u64, hashes: u64) {
        let slot = &mut self.buckets[(minute % WINDOW_MINUTES) as usize];
        if slot.minute != minute {
            *slot = Bucket { minute, hashes: 0 };
        }
        slot.hashes += hashes;
    }

    /// Average hashes per minute over the trailing window ending at
    /// `now_minute`.
    ///
    /// Finds the earliest and latest non-empty minutes in the window and
    /// averages the minutes strictly between them; the two endpoint minutes
    /// are partial and excluded, while empty interior minutes still count
    /// toward the divisor.
    pub fn average(&self, now_minute: u64) -> u64 {
        let lo = now_minute.saturating_sub(WINDOW_MINUTES - 1);

        let mut first = None;
        let mut last = None;
        for minute in lo..=now_minute {
            let slot = self.buckets[(minute % WINDOW_MINUTES) as usize];
            if slot.minute == minute && slot.hashes > 0 {
                if first.is_none() {
                    first = Some(minute);
                }
                last = Some(minute);
            }
        }

        let (Some(first), Some(last)) = (first, last) else {
            return 0;
        };
        if last <= first + 1 {
            return 0;
        }

        let mut hashes = 0u64;
        let mut count = 0u64;
        for minute in first + 1..last {
            let slot = self.buckets[(minute % WINDOW_MINUTES) as usize];
            if slot.minute == minute {
                hashes += slot.hashes;
            }
            count += 1;
        }
        hashes / count
    }
}

impl Default for HashrateWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time mining statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    /// Average hashes per minute over the trailing window
    pub hash_rate: u64,
    /// Candidates this client found (primary account only)
    pub candidates: u64,
    /// Candidates later referenced as a template predecessor
    pub confirmed: u64,
    /// `confirmed / candidates * 100`, 0 when no candidates yet
    pub confirmation_rate: f64,
}

/// Confirmation ratio in percent; 0 when there are no candidates.
pub fn confirmation_rate(candidates: u64, confirmed: u64) -> f64 {
    if candidates == 0 {
        0.0
    } else {
        confirmed as f64 / candidates as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window() {
        let window = HashrateWindow::new();
        assert_eq!(window.average(minute_now()), 0);
    }

    #[test]
    fn test_endpoints_excluded() {
        let mut window = HashrateWindow::new();
        let now = 10_000u64;
        // Partial endpoint minutes carry huge counts that must not leak in.
        window.record(now - 10, 1_000_000);
        window.record(now - 9, 600);
        window.record(now - 8, 600);
        window.record(now - 7, 1_000_000);

        assert_eq!(window.average(now), 600);
    }

    #[test]
    fn test_empty_interior_minutes_dilute_average() {
        let mut window = HashrateWindow::new();
        let now = 10_000u64;
        window.record(now - 6, 1);
        window.record(now - 4, 900);
        window.record(now - 3, 0); // does not mark the bucket non-empty
        window.record(now - 1, 1);

        // Interior minutes are now-5..=now-2, of which only now-4 has hashes.
        assert_eq!(window.average(now), 900 / 4);
    }

    #[test]
    fn test_fewer_than_three_buckets_is_zero() {
        let mut window = HashrateWindow::new();
        let now = 10_000u64;
        window.record(now - 2, 500);
        assert_eq!(window.average(now), 0);

        window.record(now - 1, 500);
        assert_eq!(window.average(now), 0);
    }

    #[test]
    fn test_stale_slot_reuse() {
        let mut window = HashrateWindow::new();
        let old = 10_000u64;
        window.record(old, 999);

        // A full window later the same slot is reused for a new minute.
        let new = old + WINDOW_MINUTES;
        window.record(new, 5);
        window.record(new, 7);

        window.record(new - 1, 100);
        window.record(new + 1, 100);
        // Interior of (new-1, new+1) is exactly minute `new`.
        assert_eq!(window.average(new + 1), 12);
    }

    #[test]
    fn test_confirmation_rate() {
        assert_eq!(confirmation_rate(0, 0), 0.0);
        assert_eq!(confirmation_rate(4, 1), 25.0);
        assert_eq!(confirmation_rate(3, 3), 100.0);
    }
}
