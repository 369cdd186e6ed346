use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_HEARTS: i32 = 5;
pub const SECONDS_PER_HEART: i64 = 1800; // 30 minutes

/// Durable per-user hearts row. `last_refill_at` anchors the regeneration
/// clock; it only moves while `current < max` (the clock is idle at full).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserHearts {
    pub user_id: i64,
    pub current: i32,
    pub max: i32,
    pub last_refill_at: DateTime<Utc>,
}

impl UserHearts {
    pub fn full(user_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            current: DEFAULT_MAX_HEARTS,
            max: DEFAULT_MAX_HEARTS,
            last_refill_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartsState {
    pub current: i32,
    pub max: i32,
    pub regen: RegenInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenInfo {
    pub seconds_per_heart: i64,
    /// Present whenever `current < max`: hearts regenerate continuously, one
    /// per interval, not only once the user is fully depleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_heart_in_seconds: Option<i64>,
}

/// Fold elapsed time into the counter: one heart per full interval since
/// `last_refill_at`, clamped at `max`. Returns the new counter and the new
/// clock anchor. Pure so the arithmetic is testable without storage.
pub fn fold_regen(
    current: i32,
    max: i32,
    last_refill_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> (i32, DateTime<Utc>) {
    if current >= max {
        return (current.min(max), last_refill_at);
    }

    let elapsed = (now - last_refill_at).num_seconds().max(0);
    let refilled = (elapsed / SECONDS_PER_HEART) as i32;
    if refilled == 0 {
        return (current, last_refill_at);
    }

    let new_current = (current + refilled).min(max);
    let new_anchor = if new_current >= max {
        // Clock goes idle at full; it restarts on the next spend.
        now
    } else {
        last_refill_at + Duration::seconds(i64::from(refilled) * SECONDS_PER_HEART)
    };
    (new_current, new_anchor)
}

/// Seconds until the next heart lands, assuming the fold has already been
/// applied (so less than one full interval has elapsed since the anchor).
pub fn seconds_until_next_heart(
    current: i32,
    max: i32,
    last_refill_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<i64> {
    if current >= max {
        return None;
    }
    let elapsed = (now - last_refill_at)
        .num_seconds()
        .clamp(0, SECONDS_PER_HEART - 1);
    Some(SECONDS_PER_HEART - elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn no_regen_before_a_full_interval() {
        let (current, anchor) = fold_regen(2, 5, at(0), at(SECONDS_PER_HEART - 1));
        assert_eq!(current, 2);
        assert_eq!(anchor, at(0));
    }

    #[test]
    fn one_heart_per_interval() {
        let (current, anchor) = fold_regen(1, 5, at(0), at(SECONDS_PER_HEART * 2 + 30));
        assert_eq!(current, 3);
        // anchor advances by exactly the consumed intervals, keeping the
        // 30 leftover seconds counting toward the next heart
        assert_eq!(anchor, at(SECONDS_PER_HEART * 2));
    }

    #[test]
    fn regen_caps_at_max() {
        let (current, anchor) = fold_regen(0, 5, at(0), at(SECONDS_PER_HEART * 40));
        assert_eq!(current, 5);
        assert_eq!(anchor, at(SECONDS_PER_HEART * 40));
    }

    #[test]
    fn clock_is_idle_at_full() {
        let (current, anchor) = fold_regen(5, 5, at(0), at(SECONDS_PER_HEART * 10));
        assert_eq!(current, 5);
        assert_eq!(anchor, at(0));
    }

    #[test]
    fn next_heart_countdown() {
        assert_eq!(seconds_until_next_heart(5, 5, at(0), at(10)), None);
        assert_eq!(
            seconds_until_next_heart(0, 5, at(0), at(0)),
            Some(SECONDS_PER_HEART)
        );
        assert_eq!(
            seconds_until_next_heart(2, 5, at(0), at(100)),
            Some(SECONDS_PER_HEART - 100)
        );
    }

    #[test]
    fn negative_elapsed_is_treated_as_zero() {
        // Clock skew between app instances must never subtract hearts
        let (current, anchor) = fold_regen(3, 5, at(100), at(0));
        assert_eq!(current, 3);
        assert_eq!(anchor, at(100));
    }
}
