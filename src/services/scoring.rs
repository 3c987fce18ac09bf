//! Run scoring.

pub const BASE_SCORE: f64 = 100.0;
pub const SPEED_BONUS: f64 = 10.0;
/// Runs finishing strictly under this many seconds earn the bonus.
pub const SPEED_THRESHOLD_SECS: f64 = 300.0;
pub const COMMIT_ALLOWANCE: u32 = 20;
pub const COMMIT_PENALTY: f64 = 2.0;
pub const MAX_SCORE: f64 = 110.0;

/// Score a finished run, always within `[0, 110]`.
///
/// `failures_detected`, `fixes_applied` and `iterations_used` are part of
/// the contract but do not currently move the score.
pub fn score(
    _failures_detected: u32,
    _fixes_applied: u32,
    _iterations_used: u32,
    total_time_seconds: f64,
    total_commits: u32,
) -> f64 {
    let elapsed = if total_time_seconds.is_finite() {
        total_time_seconds
    } else {
        0.0
    };

    let mut total = BASE_SCORE;
    if elapsed > 0.0 && elapsed < SPEED_THRESHOLD_SECS {
        total += SPEED_BONUS;
    }
    total -= f64::from(total_commits.saturating_sub(COMMIT_ALLOWANCE)) * COMMIT_PENALTY;
    total.clamp(0.0, MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_run_gets_bonus() {
        assert_eq!(score(1, 1, 1, 12.5, 1), 110.0);
    }

    #[test]
    fn test_slow_or_instant_run_gets_base() {
        assert_eq!(score(1, 1, 1, 300.0, 1), 100.0);
        assert_eq!(score(1, 1, 1, 0.0, 1), 100.0);
        assert_eq!(score(1, 1, 1, f64::NAN, 1), 100.0);
    }

    #[test]
    fn test_commit_penalty() {
        assert_eq!(score(0, 0, 1, 600.0, 20), 100.0);
        assert_eq!(score(0, 0, 1, 600.0, 25), 90.0);
        assert_eq!(score(0, 0, 1, 600.0, 500), 0.0);
    }
}
