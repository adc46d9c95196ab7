use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chain::ChainGateway;
use crate::db::MatchStore;
use crate::engine::policy::{decide, RefetchThrottle, UpkeepPolicy};
use crate::error::Result;
use crate::scores::ScoreProvider;
use crate::types::{
    BatchReport, Match, MatchOutcome, MatchReport, MatchResult, MatchStatus, Score, ScoreUpdate,
};

/// Decides and performs the upkeep/finalization work for a batch of matches.
pub struct UpkeepEngine {
    chain: Arc<dyn ChainGateway>,
    scores: Arc<dyn ScoreProvider>,
    policy: UpkeepPolicy,
}

impl UpkeepEngine {
    pub fn new(
        chain: Arc<dyn ChainGateway>,
        scores: Arc<dyn ScoreProvider>,
        policy: UpkeepPolicy,
    ) -> Self {
        Self { chain, scores, policy }
    }

    /// Process `matches` strictly in order. Every match gets its own result; a failure
    /// on one never stops the others. Writes for a match are committed before the next
    /// match starts.
    pub async fn process_batch(&self, store: &MatchStore, matches: &[Match], now: i64) -> BatchReport {
        let mut throttle = RefetchThrottle::default();
        let mut report = BatchReport::default();

        for m in matches {
            let outcome = match self.process_match(store, m, now, &mut throttle).await {
                Ok(r) => MatchOutcome::Processed(r),
                Err(e) => {
                    let kind = e.kind();
                    error!(match_id = m.match_id, address = %m.address, kind = %kind, "Match skipped: {e}");
                    MatchOutcome::Failed { kind, error: e }
                }
            };
            report.results.push(MatchResult {
                match_id: m.match_id,
                outcome,
            });
        }

        report
    }

    async fn process_match(
        &self,
        store: &MatchStore,
        m: &Match,
        now: i64,
        throttle: &mut RefetchThrottle,
    ) -> Result<MatchReport> {
        let upkeep = if self.chain.is_upkeep_needed(&m.address).await? {
            let receipt = self.chain.submit_upkeep(&m.address).await?;
            info!(
                match_id = m.match_id,
                tx_hash = %receipt.tx_hash,
                block = ?receipt.block_number,
                success = receipt.success,
                "performUpkeep mined"
            );
            Some(receipt)
        } else {
            None
        };

        let winner_state = self.chain.get_winner_state(&m.address).await?;
        let mut report = MatchReport {
            upkeep,
            winner_state,
            finalized: false,
            refetched: false,
            score: ScoreUpdate::Skipped,
        };

        let decision = decide(m, winner_state, now, &self.policy);
        // The throttle counts every eligible match, finalizing or not.
        let refetch = decision.refetch && throttle.tick();
        if !decision.finalize && !refetch {
            return Ok(report);
        }

        // One provider call serves both finalization and the re-fetch.
        report.score = self.fetch_score(m).await;
        report.finalized = decision.finalize;
        report.refetched = refetch;

        let stored = match report.score {
            ScoreUpdate::Stored(score) => Some(score),
            _ => None,
        };
        // The status advances even when the score could not be fetched.
        let advance = decision.finalize && m.status < MatchStatus::Finalized;
        if stored.is_none() && !advance {
            return Ok(report);
        }

        let mut session = store.begin().await?;
        if let Some(score) = stored {
            session.update_score(m.match_id, score).await?;
        }
        if advance {
            session
                .update_status(m.match_id, MatchStatus::Finalized)
                .await?;
        }
        session.commit().await?;

        if decision.finalize {
            info!(
                match_id = m.match_id,
                winner_state,
                refetch,
                score = ?report.score,
                "Match finalized"
            );
        } else {
            info!(match_id = m.match_id, score = ?report.score, "Score re-fetched");
        }

        Ok(report)
    }

    /// Score failures are logged and reported, never propagated.
    async fn fetch_score(&self, m: &Match) -> ScoreUpdate {
        match self.fetch_final_score(m).await {
            Ok(score) => ScoreUpdate::Stored(score),
            Err(e) => {
                warn!(match_id = m.match_id, "Score unavailable: {e}");
                ScoreUpdate::Unavailable(e.kind())
            }
        }
    }

    async fn fetch_final_score(&self, m: &Match) -> Result<Score> {
        let external_id = self.chain.get_match_id(&m.address).await?;
        self.scores.fetch_final_score(external_id).await
    }
}
