use serde::{Deserialize, Serialize};

use crate::error::{AppError, ErrorKind};

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// Lifecycle of a tracked bet contract. Stored as the `isDeployed` column.
/// Ordered so that `Active < Finalized`; a match only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Active = 1,
    Finalized = 2,
}

impl MatchStatus {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(MatchStatus::Active),
            2 => Some(MatchStatus::Finalized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: i64,
    pub away: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: i64,
    pub address: String,
    /// Unix seconds at which the bet contract went live.
    pub deploy_date: i64,
    pub status: MatchStatus,
    pub score: Option<Score>,
}

/// A freshly deployed contract, as registered by the deployment tooling.
#[derive(Debug, Clone)]
pub struct NewMatch {
    pub match_id: i64,
    pub address: String,
    pub deploy_date: i64,
}

/// Key used by the score provider, read from the contract itself.
pub type ExternalMatchId = u64;

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub success: bool,
}

// ---------------------------------------------------------------------------
// Batch results
// ---------------------------------------------------------------------------

/// What happened to the stored score during a finalization or re-fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreUpdate {
    /// No fetch was attempted.
    Skipped,
    Stored(Score),
    /// The provider failed; the stored score was left as it was.
    Unavailable(ErrorKind),
}

/// Everything the engine did for one match that made it through the cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub upkeep: Option<TxReceipt>,
    pub winner_state: u8,
    pub finalized: bool,
    pub refetched: bool,
    pub score: ScoreUpdate,
}

#[derive(Debug)]
pub enum MatchOutcome {
    Processed(MatchReport),
    Failed { kind: ErrorKind, error: AppError },
}

#[derive(Debug)]
pub struct MatchResult {
    pub match_id: i64,
    pub outcome: MatchOutcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<MatchResult>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.reports().count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.processed()
    }

    pub fn upkeeps(&self) -> usize {
        self.reports().filter(|r| r.upkeep.is_some()).count()
    }

    pub fn finalized(&self) -> usize {
        self.reports().filter(|r| r.finalized).count()
    }

    pub fn refetched(&self) -> usize {
        self.reports().filter(|r| r.refetched).count()
    }

    #[cfg(test)]
    pub fn result_for(&self, match_id: i64) -> Option<&MatchOutcome> {
        self.results
            .iter()
            .find(|r| r.match_id == match_id)
            .map(|r| &r.outcome)
    }

    fn reports(&self) -> impl Iterator<Item = &MatchReport> {
        self.results.iter().filter_map(|r| match &r.outcome {
            MatchOutcome::Processed(report) => Some(report),
            MatchOutcome::Failed { .. } => None,
        })
    }
}
