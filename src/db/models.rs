//! Database row types matching `migrations/0001_matches.sql`.
//! Used by sqlx for typed queries.

use crate::error::{AppError, Result};
use crate::types::{Match, MatchStatus, Score};

#[derive(Debug, sqlx::FromRow)]
pub struct MatchRow {
    pub match_id: i64,
    pub address: String,
    pub date: i64,
    #[sqlx(rename = "isDeployed")]
    pub is_deployed: i64,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
}

impl TryFrom<MatchRow> for Match {
    type Error = AppError;

    fn try_from(row: MatchRow) -> Result<Self> {
        let status = MatchStatus::from_code(row.is_deployed).ok_or_else(|| {
            AppError::Database(sqlx::Error::Decode(
                format!("match {}: unknown isDeployed value {}", row.match_id, row.is_deployed).into(),
            ))
        })?;

        // A half-written score is treated as no score at all.
        let score = match (row.home_score, row.away_score) {
            (Some(home), Some(away)) => Some(Score { home, away }),
            _ => None,
        };

        Ok(Match {
            match_id: row.match_id,
            address: row.address,
            deploy_date: row.date,
            status,
            score,
        })
    }
}
