//! `ChainGateway` backed by an alloy HTTP provider and the process's single signer.

use std::time::Duration;

use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use alloy::sol;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::chain::ChainGateway;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{ExternalMatchId, TxReceipt};

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IBet {
        function checkUpkeep(bytes calldata checkData) external view returns (bool upkeepNeeded, bytes memory performData);
        function performUpkeep(bytes calldata performData) external;
        function getWinner() external view returns (uint8);
        function getMatchId() external view returns (uint256);
    }
}

pub struct BetContractGateway {
    provider: DynProvider,
    receipt_timeout: Duration,
}

impl BetContractGateway {
    /// Build the signing provider. Bad key or URL is a config error, caught at startup.
    pub fn new(cfg: &Config) -> Result<Self> {
        let signer: PrivateKeySigner = cfg
            .private_key
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid private key: {e}")))?;
        let signer = signer.with_chain_id(Some(cfg.chain_id));
        let keeper_address = signer.address();

        let rpc_url: reqwest::Url = cfg
            .rpc_url
            .parse()
            .map_err(|e| AppError::Config(format!("Invalid RPC URL: {e}")))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(rpc_url)
            .erased();

        info!(chain_id = cfg.chain_id, keeper = %keeper_address, "Chain gateway ready");
        Ok(Self {
            provider,
            receipt_timeout: Duration::from_secs(cfg.receipt_timeout_secs),
        })
    }

    fn contract(&self, address: &str) -> Result<IBet::IBetInstance<DynProvider>> {
        let addr: Address = address
            .parse()
            .map_err(|e| AppError::Rpc(format!("invalid contract address {address}: {e}")))?;
        Ok(IBet::new(addr, self.provider.clone()))
    }
}

fn rpc_err(call: &str, address: &str, e: impl std::fmt::Display) -> AppError {
    AppError::Rpc(format!("{call} on {address}: {e}"))
}

#[async_trait]
impl ChainGateway for BetContractGateway {
    async fn is_upkeep_needed(&self, address: &str) -> Result<bool> {
        let ret = self
            .contract(address)?
            .checkUpkeep(Bytes::new())
            .call()
            .await
            .map_err(|e| rpc_err("checkUpkeep", address, e))?;
        debug!(address, upkeep_needed = ret.upkeepNeeded, "checkUpkeep");
        Ok(ret.upkeepNeeded)
    }

    async fn submit_upkeep(&self, address: &str) -> Result<TxReceipt> {
        let pending = self
            .contract(address)?
            .performUpkeep(Bytes::new())
            .send()
            .await
            .map_err(|e| rpc_err("performUpkeep", address, e))?;
        debug!(address, tx_hash = %pending.tx_hash(), "performUpkeep sent");

        let receipt = pending
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| rpc_err("performUpkeep receipt", address, e))?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        if !receipt.status() {
            return Err(AppError::Transaction {
                tx_hash,
                block_number: receipt.block_number,
            });
        }

        Ok(TxReceipt {
            tx_hash,
            block_number: receipt.block_number,
            success: true,
        })
    }

    async fn get_winner_state(&self, address: &str) -> Result<u8> {
        self.contract(address)?
            .getWinner()
            .call()
            .await
            .map_err(|e| rpc_err("getWinner", address, e))
    }

    async fn get_match_id(&self, address: &str) -> Result<ExternalMatchId> {
        let id = self
            .contract(address)?
            .getMatchId()
            .call()
            .await
            .map_err(|e| rpc_err("getMatchId", address, e))?;
        u64::try_from(id)
            .map_err(|_| AppError::Rpc(format!("getMatchId on {address}: id {id} out of range")))
    }
}
