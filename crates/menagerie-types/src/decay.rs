//! Pure stat-decay arithmetic shared by the live tick and the offline
//! recompute job.
//!
//! Decay is linear in elapsed wall-clock time: a stat loses
//! `rate_per_hour x hours_elapsed`, floored at the stat minimum. All
//! arithmetic is [`Decimal`] so long-running rooms accumulate no
//! floating-point drift. There is exactly one implementation of this
//! formula -- every call site goes through [`decay_stat`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::pet::{STAT_MIN, clamp_stat};

/// Milliseconds per hour, as a [`Decimal`] divisor.
const MS_PER_HOUR: Decimal = Decimal::from_parts(3_600_000, 0, 0, false, 0);

/// Result of applying decay to a single stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayOutcome {
    /// The stat value after decay, clamped to the valid range.
    pub value: Decimal,
    /// The refreshed `last_updated` timestamp.
    pub last_updated: DateTime<Utc>,
}

/// Apply linear decay to one stat.
///
/// Computes `value - rate_per_hour x hours_elapsed`, floored at the stat
/// minimum, and refreshes `last_updated` to `now`.
///
/// Edge cases:
/// - `now <= last_updated` (clock skew, duplicate tick): the stat and the
///   timestamp are returned unchanged -- decay never runs backwards.
/// - multiplication overflow: the stat drops to the floor, which is the
///   limit of any finite decay anyway.
pub fn decay_stat(
    value: Decimal,
    last_updated: DateTime<Utc>,
    rate_per_hour: Decimal,
    now: DateTime<Utc>,
) -> DecayOutcome {
    let elapsed_ms = now.signed_duration_since(last_updated).num_milliseconds();
    if elapsed_ms <= 0 {
        return DecayOutcome {
            value,
            last_updated,
        };
    }

    let hours = Decimal::from(elapsed_ms)
        .checked_div(MS_PER_HOUR)
        .unwrap_or(Decimal::ZERO);
    let loss = rate_per_hour.checked_mul(hours);

    let decayed = loss.map_or(STAT_MIN, |l| value.saturating_sub(l));

    DecayOutcome {
        value: clamp_stat(decayed),
        last_updated: now,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    #[test]
    fn one_hour_at_rate_five_loses_five() {
        let now = Utc::now();
        let then = now - Duration::milliseconds(3_600_000);
        let out = decay_stat(dec(100), then, dec(5), now);
        assert_eq!(out.value, dec(95));
        assert_eq!(out.last_updated, now);
    }

    #[test]
    fn half_hour_loses_fractional_amount() {
        let now = Utc::now();
        let then = now - Duration::milliseconds(1_800_000);
        let out = decay_stat(dec(100), then, dec(5), now);
        assert_eq!(out.value, Decimal::new(975, 1));
    }

    #[test]
    fn decay_floors_at_zero() {
        let now = Utc::now();
        let then = now - Duration::hours(1000);
        let out = decay_stat(dec(10), then, dec(5), now);
        assert_eq!(out.value, STAT_MIN);
    }

    #[test]
    fn non_positive_elapsed_is_a_no_op() {
        let now = Utc::now();
        let future = now + Duration::hours(1);
        let out = decay_stat(dec(80), future, dec(5), now);
        assert_eq!(out.value, dec(80));
        assert_eq!(out.last_updated, future);
    }

    #[test]
    fn repeated_decay_stays_in_range() {
        let mut value = dec(100);
        let mut last = Utc::now() - Duration::hours(500);
        for step in 1..=500i64 {
            let now = last + Duration::hours(1);
            let out = decay_stat(value, last, Decimal::new(25, 1), now);
            value = out.value;
            last = out.last_updated;
            assert!(value >= STAT_MIN, "step {step} went below range");
            assert!(value <= dec(100), "step {step} went above range");
        }
        assert_eq!(value, STAT_MIN);
    }
}
