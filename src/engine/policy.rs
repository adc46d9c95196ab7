use crate::config::{Config, EARLY_GRACE_DAYS, REFETCH_EVERY, SECS_PER_DAY};
use crate::types::{Match, MatchStatus};

/// Time thresholds, in seconds after `deploy_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpkeepPolicy {
    pub early_grace_secs: i64,
    pub refetch_after_secs: i64,
}

impl UpkeepPolicy {
    /// Out-of-range day counts saturate; `Config` rejects them before this point.
    pub fn new(timeout_keeper_needed_days: u64) -> Self {
        Self {
            early_grace_secs: days_to_secs(EARLY_GRACE_DAYS),
            refetch_after_secs: days_to_secs(timeout_keeper_needed_days),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.timeout_keeper_needed_days)
    }
}

/// Whole days as seconds, `None` when the result does not fit an `i64`.
pub fn checked_days_to_secs(days: u64) -> Option<i64> {
    days.checked_mul(SECS_PER_DAY)
        .and_then(|secs| i64::try_from(secs).ok())
}

fn days_to_secs(days: u64) -> i64 {
    checked_days_to_secs(days).unwrap_or(i64::MAX)
}

/// The two independent tests run on every match once its winner state is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Decision {
    /// Fetch the score, store it if available, mark the match finalized.
    pub finalize: bool,
    /// Eligible for a throttled score overwrite; never changes status.
    pub refetch: bool,
}

/// Decide what a match needs from the snapshot values and the on-chain winner state.
///
/// A still-active match finalizes as soon as it is past the grace period or a
/// winner exists. Separately, any match past the long timeout with a winner on chain
/// is a re-fetch candidate, so an active match can be both in the same cycle.
pub fn decide(m: &Match, winner_state: u8, now: i64, policy: &UpkeepPolicy) -> Decision {
    let has_winner = winner_state != 0;
    let past_grace = now > m.deploy_date.saturating_add(policy.early_grace_secs);
    let past_timeout = now > m.deploy_date.saturating_add(policy.refetch_after_secs);

    Decision {
        finalize: (past_grace || has_winner) && m.status == MatchStatus::Active,
        refetch: has_winner && past_timeout,
    }
}

/// Batch-scoped limiter for score re-fetches: the first eligible match fires, then
/// every `every`-th after it. Created fresh for each batch; nothing carries over
/// between invocations.
#[derive(Debug)]
pub struct RefetchThrottle {
    count: u32,
    every: u32,
}

impl RefetchThrottle {
    pub fn new(every: u32) -> Self {
        Self {
            count: 0,
            every: every.max(1),
        }
    }

    /// Register one eligible match; true when this one should hit the API.
    pub fn tick(&mut self) -> bool {
        let fire = self.count == 0;
        self.count += 1;
        if self.count == self.every {
            self.count = 0;
        }
        fire
    }

    #[cfg(test)]
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Default for RefetchThrottle {
    fn default() -> Self {
        Self::new(REFETCH_EVERY)
    }
}
