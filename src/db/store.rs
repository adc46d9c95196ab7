use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::db::models::MatchRow;
use crate::error::{AppError, Result};
use crate::types::{Match, MatchStatus, NewMatch, Score};

/// Persisted table of tracked matches. The only state that survives between runs.
///
/// Reads go straight to the pool. Writes go through a [`MatchSession`], one per
/// processed match, so a crash mid-batch leaves every earlier match committed and
/// the current one untouched.
#[derive(Clone)]
pub struct MatchStore {
    pool: SqlitePool,
}

impl MatchStore {
    /// Open (creating if needed) the SQLite file at `path` and apply migrations.
    pub async fn connect(path: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))?
            .create_if_missing(true);
        // Single writer per invocation.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        let store = Self::from_pool(pool).await?;
        info!("Match store ready at {path}");
        Ok(store)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// All matches still owed upkeep or finalization, in insertion order.
    /// The returned rows are a snapshot: later writes in the same batch are not reflected.
    pub async fn list_active(&self) -> Result<Vec<Match>> {
        let rows: Vec<MatchRow> = sqlx::query_as(
            r#"
            SELECT match_id, address, date, isDeployed, home_score, away_score
            FROM matches
            WHERE isDeployed = ?
            ORDER BY rowid
            "#,
        )
        .bind(MatchStatus::Active.code())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Match::try_from).collect()
    }

    pub async fn get(&self, match_id: i64) -> Result<Option<Match>> {
        let row: Option<MatchRow> = sqlx::query_as(
            r#"
            SELECT match_id, address, date, isDeployed, home_score, away_score
            FROM matches
            WHERE match_id = ?
            "#,
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Match::try_from).transpose()
    }

    /// Register a deployed contract as an active match.
    pub async fn insert(&self, m: &NewMatch) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO matches (match_id, address, date, isDeployed)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(m.match_id)
        .bind(&m.address)
        .bind(m.deploy_date)
        .bind(MatchStatus::Active.code())
        .execute(&self.pool)
        .await?;
        debug!(match_id = m.match_id, address = %m.address, "Registered match");
        Ok(())
    }

    /// Start the write session for one match.
    pub async fn begin(&self) -> Result<MatchSession> {
        Ok(MatchSession {
            tx: self.pool.begin().await?,
        })
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        // One connection that never recycles, otherwise the in-memory database vanishes.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }
}

/// Pending writes for a single match. Dropped without [`MatchSession::commit`] it rolls back.
pub struct MatchSession {
    tx: Transaction<'static, Sqlite>,
}

impl MatchSession {
    /// Set the lifecycle status. Monotonicity is the caller's job.
    pub async fn update_status(&mut self, match_id: i64, status: MatchStatus) -> Result<()> {
        let result = sqlx::query("UPDATE matches SET isDeployed = ? WHERE match_id = ?")
            .bind(status.code())
            .bind(match_id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(match_id));
        }
        Ok(())
    }

    pub async fn update_score(&mut self, match_id: i64, score: Score) -> Result<()> {
        let result =
            sqlx::query("UPDATE matches SET home_score = ?, away_score = ? WHERE match_id = ?")
                .bind(score.home)
                .bind(score.away)
                .bind(match_id)
                .execute(&mut *self.tx)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(match_id));
        }
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_match(match_id: i64, deploy_date: i64) -> NewMatch {
        NewMatch {
            match_id,
            address: format!("0x{match_id:040x}"),
            deploy_date,
        }
    }

    #[tokio::test]
    async fn list_active_returns_insertion_order() {
        let store = MatchStore::in_memory().await.unwrap();
        for id in [300, 100, 200] {
            store.insert(&new_match(id, 1_000)).await.unwrap();
        }

        let ids: Vec<i64> = store
            .list_active()
            .await
            .unwrap()
            .iter()
            .map(|m| m.match_id)
            .collect();
        assert_eq!(ids, vec![300, 100, 200]);
    }

    #[tokio::test]
    async fn score_writes_do_not_reorder_active_matches() {
        let store = MatchStore::in_memory().await.unwrap();
        for id in [9_000_000, 42, 7] {
            store.insert(&new_match(id, 1_000)).await.unwrap();
        }
        let mut session = store.begin().await.unwrap();
        session.update_score(42, Score { home: 0, away: 1 }).await.unwrap();
        session.commit().await.unwrap();

        let ids: Vec<i64> = store
            .list_active()
            .await
            .unwrap()
            .iter()
            .map(|m| m.match_id)
            .collect();
        assert_eq!(ids, vec![9_000_000, 42, 7]);
    }

    #[tokio::test]
    async fn finalized_matches_are_not_listed() {
        let store = MatchStore::in_memory().await.unwrap();
        store.insert(&new_match(1, 1_000)).await.unwrap();
        store.insert(&new_match(2, 1_000)).await.unwrap();

        let mut session = store.begin().await.unwrap();
        session.update_status(1, MatchStatus::Finalized).await.unwrap();
        session.commit().await.unwrap();

        let active = store.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].match_id, 2);
        assert_eq!(active[0].status, MatchStatus::Active);
        assert!(active[0].score.is_none());
    }

    #[tokio::test]
    async fn list_active_is_a_snapshot() {
        let store = MatchStore::in_memory().await.unwrap();
        store.insert(&new_match(1, 1_000)).await.unwrap();
        let snapshot = store.list_active().await.unwrap();

        let mut session = store.begin().await.unwrap();
        session.update_status(1, MatchStatus::Finalized).await.unwrap();
        session.commit().await.unwrap();

        assert_eq!(snapshot[0].status, MatchStatus::Active);
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let store = MatchStore::in_memory().await.unwrap();
        let mut session = store.begin().await.unwrap();

        let err = session
            .update_status(42, MatchStatus::Finalized)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(42)));

        let err = session
            .update_score(42, Score { home: 1, away: 0 })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(42)));
    }

    #[tokio::test]
    async fn score_overwrite_is_idempotent() {
        let store = MatchStore::in_memory().await.unwrap();
        store.insert(&new_match(7, 1_000)).await.unwrap();
        let score = Score { home: 2, away: 1 };

        for _ in 0..2 {
            let mut session = store.begin().await.unwrap();
            session.update_score(7, score).await.unwrap();
            session.commit().await.unwrap();
        }

        let stored = store.get(7).await.unwrap().unwrap();
        assert_eq!(stored.score, Some(score));
    }

    #[tokio::test]
    async fn dropped_session_rolls_back() {
        let store = MatchStore::in_memory().await.unwrap();
        store.insert(&new_match(9, 1_000)).await.unwrap();

        {
            let mut session = store.begin().await.unwrap();
            session.update_status(9, MatchStatus::Finalized).await.unwrap();
            session
                .update_score(9, Score { home: 3, away: 3 })
                .await
                .unwrap();
        }

        let stored = store.get(9).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Active);
        assert!(stored.score.is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_database_error() {
        let store = MatchStore::in_memory().await.unwrap();
        store.insert(&new_match(5, 1_000)).await.unwrap();
        let err = store.insert(&new_match(5, 2_000)).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
