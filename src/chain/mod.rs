pub mod contract;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ExternalMatchId, TxReceipt};

pub use contract::BetContractGateway;

/// Calls against one deployed bet contract, addressed per call.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// `checkUpkeep` view call. Fails with `AppError::Rpc` on transport errors.
    async fn is_upkeep_needed(&self, address: &str) -> Result<bool>;

    /// Sign, send and wait for `performUpkeep`. Only call after `is_upkeep_needed`
    /// returned true in the same cycle. A reverted receipt is `AppError::Transaction`.
    async fn submit_upkeep(&self, address: &str) -> Result<TxReceipt>;

    /// `getWinner`: 0 while no result exists.
    async fn get_winner_state(&self, address: &str) -> Result<u8>;

    async fn get_match_id(&self, address: &str) -> Result<ExternalMatchId>;
}
