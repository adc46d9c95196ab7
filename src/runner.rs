use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::db::MatchStore;
use crate::engine::UpkeepEngine;
use crate::error::Result;
use crate::types::BatchReport;

/// One keeper tick: snapshot the active matches and run them through the engine.
/// Only a failure to read the store is an error; per-match failures live in the report.
pub async fn run_once(store: &MatchStore, engine: &UpkeepEngine) -> Result<BatchReport> {
    let matches = store.list_active().await?;
    info!("Processing {} active matches", matches.len());

    let report = engine.process_batch(store, &matches, now_secs()).await;
    info!(
        processed = report.processed(),
        failed = report.failed(),
        upkeeps = report.upkeeps(),
        finalized = report.finalized(),
        refetched = report.refetched(),
        "Batch complete"
    );
    Ok(report)
}

/// Re-run the batch every `every_secs`, starting immediately, until Ctrl-C.
pub async fn run_scheduled(store: &MatchStore, engine: &UpkeepEngine, every_secs: u64) {
    let mut ticker = interval(Duration::from_secs(every_secs));
    // A slow batch delays the next one instead of triggering a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Keeper scheduled every {every_secs}s");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_once(store, engine).await {
                    error!("Batch failed: {e}");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested, keeper stopping");
                break;
            }
        }
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::chain::ChainGateway;
    use crate::engine::UpkeepPolicy;
    use crate::error::AppError;
    use crate::scores::ScoreProvider;
    use crate::types::{ExternalMatchId, MatchOutcome, MatchStatus, NewMatch, Score, TxReceipt};

    /// Every contract already has a winner; never asks for upkeep.
    struct SettledChain;

    #[async_trait]
    impl ChainGateway for SettledChain {
        async fn is_upkeep_needed(&self, _address: &str) -> Result<bool> {
            Ok(false)
        }

        async fn submit_upkeep(&self, address: &str) -> Result<TxReceipt> {
            Err(AppError::Rpc(format!("unexpected upkeep on {address}")))
        }

        async fn get_winner_state(&self, _address: &str) -> Result<u8> {
            Ok(1)
        }

        async fn get_match_id(&self, _address: &str) -> Result<ExternalMatchId> {
            Ok(7)
        }
    }

    #[derive(Default)]
    struct FixedScore {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl ScoreProvider for FixedScore {
        async fn fetch_final_score(&self, _match_id: ExternalMatchId) -> Result<Score> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Score { home: 1, away: 0 })
        }
    }

    const DAY: i64 = 24 * 60 * 60;

    fn engine_with(scores: Arc<FixedScore>) -> UpkeepEngine {
        UpkeepEngine::new(Arc::new(SettledChain), scores, UpkeepPolicy::new(10))
    }

    fn engine() -> UpkeepEngine {
        engine_with(Arc::new(FixedScore::default()))
    }

    fn new_match(match_id: i64, deploy_date: i64) -> NewMatch {
        NewMatch {
            match_id,
            address: format!("0x{match_id:040x}"),
            deploy_date,
        }
    }

    fn refetched(report: &BatchReport, match_id: i64) -> bool {
        match report.result_for(match_id) {
            Some(MatchOutcome::Processed(r)) => r.refetched,
            other => panic!("unexpected outcome for {match_id}: {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_store_gives_empty_report() {
        let store = MatchStore::in_memory().await.unwrap();
        let report = run_once(&store, &engine()).await.unwrap();
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn repeated_runs_never_redo_finalization() {
        let store = MatchStore::in_memory().await.unwrap();
        store.insert(&new_match(1, now_secs())).await.unwrap();
        let engine = engine();

        let first = run_once(&store, &engine).await.unwrap();
        let second = run_once(&store, &engine).await.unwrap();

        assert_eq!(first.finalized(), 1);
        assert!(second.results.is_empty());
        let m = store.get(1).await.unwrap().unwrap();
        assert_eq!(m.status, MatchStatus::Finalized);
        assert_eq!(m.score, Some(Score { home: 1, away: 0 }));
    }

    #[tokio::test]
    async fn overdue_matches_finalize_and_share_the_refetch_throttle() {
        let store = MatchStore::in_memory().await.unwrap();
        let deployed = now_secs() - 11 * DAY;
        for id in 1..=51 {
            store.insert(&new_match(id, deployed)).await.unwrap();
        }
        let scores = Arc::new(FixedScore::default());
        let engine = engine_with(scores.clone());

        let report = run_once(&store, &engine).await.unwrap();

        assert_eq!(report.finalized(), 51);
        assert_eq!(report.refetched(), 2);
        assert!(refetched(&report, 1));
        assert!(!refetched(&report, 50));
        assert!(refetched(&report, 51));
        // One fetch per match, shared by finalization and re-fetch.
        assert_eq!(scores.fetches.load(Ordering::SeqCst), 51);
        for id in 1..=51 {
            let m = store.get(id).await.unwrap().unwrap();
            assert_eq!(m.status, MatchStatus::Finalized, "match {id}");
            assert_eq!(m.score, Some(Score { home: 1, away: 0 }), "match {id}");
        }
        assert!(store.list_active().await.unwrap().is_empty());
    }
}
