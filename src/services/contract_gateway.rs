use ethers::types::{Address, H256, U256};
use std::sync::Arc;

use super::onchain::{GameChain, WalletStatus};
use super::receipt_observer::{ConfirmedReceipt, ReceiptObserver};
use crate::{
    error::{AppError, Result},
    models::{ClaimAttestation, GameTicket, TicketPack, TicketRecord, WriteCall},
};

/// Contract Gateway: typed reads, and writes that only complete once their
/// receipt is observed as confirmed.
#[derive(Clone)]
pub struct ContractGateway {
    chain: Arc<dyn GameChain>,
    required_chain_id: u64,
    observer: ReceiptObserver,
}

impl ContractGateway {
    pub fn new(chain: Arc<dyn GameChain>, required_chain_id: u64) -> Self {
        let observer = ReceiptObserver::new(chain.contract_address());
        Self {
            chain,
            required_chain_id,
            observer,
        }
    }

    pub fn required_chain_id(&self) -> u64 {
        self.required_chain_id
    }

    /// Address of the connected wallet, or `WalletNotReady`.
    pub fn player(&self) -> Result<Address> {
        match self.chain.wallet_status() {
            WalletStatus::Ready(address) => Ok(address),
            WalletStatus::Connecting => Err(AppError::WalletNotReady(
                "Wallet is connecting. Please wait...".to_string(),
            )),
            WalletStatus::Disconnected => Err(AppError::WalletNotReady(
                "Wallet is not connected".to_string(),
            )),
        }
    }

    pub async fn read_prize_pool(&self) -> Result<U256> {
        self.chain.prize_pool().await
    }

    pub async fn read_attempt_balance(&self, player: Address) -> Result<U256> {
        self.chain.attempt_balance(player).await
    }

    pub async fn read_ticket(&self, ticket_id: U256) -> Result<TicketRecord> {
        self.chain.ticket(ticket_id).await
    }

    /// Switches to the required chain when needed; a refused or failed switch
    /// fails the pending write.
    pub async fn ensure_network(&self) -> Result<()> {
        let active = self.chain.active_chain_id().await?;
        if active == self.required_chain_id {
            return Ok(());
        }

        tracing::info!(
            "Active chain {} differs from required {}; requesting switch",
            active,
            self.required_chain_id
        );
        self.chain
            .switch_chain(self.required_chain_id)
            .await
            .map_err(|e| {
                tracing::warn!("Network switch failed: {}", e);
                AppError::WrongNetwork {
                    expected: self.required_chain_id,
                    active,
                }
            })?;

        let now_active = self.chain.active_chain_id().await?;
        if now_active != self.required_chain_id {
            return Err(AppError::WrongNetwork {
                expected: self.required_chain_id,
                active: now_active,
            });
        }
        Ok(())
    }

    pub async fn buy_attempts(&self, pack: TicketPack) -> Result<ConfirmedReceipt> {
        self.execute(WriteCall::BuyAttempts(pack)).await
    }

    /// Starts an attempt and decodes the new ticket from `AttemptStarted`.
    pub async fn start_attempt(&self) -> Result<GameTicket> {
        let receipt = self.execute(WriteCall::StartAttempt).await?;
        let (ticket_id, prize_snapshot) = receipt.attempt_started().ok_or_else(|| {
            AppError::Transaction(format!(
                "Transaction {:?} confirmed without an AttemptStarted event",
                receipt.tx_hash
            ))
        })?;
        tracing::info!(
            "Attempt started: ticket {} with prize snapshot {}",
            ticket_id,
            prize_snapshot
        );
        Ok(GameTicket {
            ticket_id,
            prize_snapshot,
        })
    }

    pub async fn claim_prize(&self, attestation: &ClaimAttestation) -> Result<ConfirmedReceipt> {
        self.execute(WriteCall::ClaimPrize(attestation.clone())).await
    }

    // Wallet check, network discipline, submit, then wait for a confirmed receipt.
    async fn execute(&self, call: WriteCall) -> Result<ConfirmedReceipt> {
        self.player()?;
        self.ensure_network().await?;

        let label = call.label();
        let tx_hash: H256 = self.chain.submit(call).await.map_err(|e| {
            tracing::warn!("{} submission failed: {}", label, e);
            e
        })?;
        let receipt = self.chain.wait_for_receipt(tx_hash).await?;
        let confirmed = self.observer.confirm(&receipt)?;
        tracing::debug!(
            "{} confirmed in block {:?} with {} game event(s)",
            label,
            confirmed.block_number,
            confirmed.events.len()
        );
        Ok(confirmed)
    }
}
