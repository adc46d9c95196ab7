pub mod football_data;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ExternalMatchId, Score};

pub use football_data::FootballDataClient;

/// Source of authoritative full-time scores.
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Fails with `AppError::ExternalApi` when the provider has no usable final score.
    async fn fetch_final_score(&self, match_id: ExternalMatchId) -> Result<Score>;
}
