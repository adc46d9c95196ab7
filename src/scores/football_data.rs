use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::scores::ScoreProvider;
use crate::types::{ExternalMatchId, Score};

/// football-data.org v4 client. Rate limited upstream, so callers keep fetches rare.
pub struct FootballDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct MatchesResponse {
    matches: Vec<ApiMatch>,
}

#[derive(Debug, Deserialize)]
struct ApiMatch {
    score: ApiScore,
}

#[derive(Debug, Deserialize)]
struct ApiScore {
    #[serde(rename = "fullTime")]
    full_time: FullTime,
}

#[derive(Debug, Deserialize)]
struct FullTime {
    home: Option<i64>,
    away: Option<i64>,
}

impl FootballDataClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.http_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: cfg.football_api_url.clone(),
            api_key: cfg.football_api_key.clone(),
        })
    }
}

#[async_trait]
impl ScoreProvider for FootballDataClient {
    async fn fetch_final_score(&self, match_id: ExternalMatchId) -> Result<Score> {
        let url = format!("{}/matches", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("ids", match_id)])
            .header("X-Auth-Token", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalApi(format!("match {match_id}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::ExternalApi(format!(
                "match {match_id}: HTTP {status}"
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| AppError::ExternalApi(format!("match {match_id}: {e}")))?;
        let score = parse_final_score(&body)
            .map_err(|e| AppError::ExternalApi(format!("match {match_id}: {e}")))?;
        debug!(match_id, home = score.home, away = score.away, "Fetched final score");
        Ok(score)
    }
}

/// Extract the full-time score of the first match in a `/v4/matches` payload.
pub fn parse_final_score(body: &str) -> std::result::Result<Score, String> {
    let resp: MatchesResponse =
        serde_json::from_str(body).map_err(|e| format!("malformed payload: {e}"))?;
    let first = resp
        .matches
        .into_iter()
        .next()
        .ok_or_else(|| "match missing from response".to_string())?;
    match (first.score.full_time.home, first.score.full_time.away) {
        (Some(home), Some(away)) => Ok(Score { home, away }),
        _ => Err("full-time score not available yet".to_string()),
    }
}
