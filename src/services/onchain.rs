use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, PendingTransaction, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Bytes, TransactionReceipt, H256, U256},
};
use std::str::FromStr;
use std::sync::Arc;

use crate::{
    config::Config,
    error::{AppError, Result},
    models::{TicketRecord, WriteCall},
};

ethers::contract::abigen!(
    GameJackpot,
    r#"[
        function prizePool() view returns (uint256)
        function attemptBalance(address) view returns (uint256)
        function tickets(uint256) view returns (address, uint256, bool)
        function buyAttempt() payable
        function buyAttempts10() payable
        function buyAttempts50() payable
        function startAttempt() returns (uint256)
        function claimPrize(uint256 ticketId, uint256 prizeSnapshot, uint256 nonce, uint256 expiresAt, bytes signature)
        event AttemptsPurchased(address indexed player, uint256 count, uint256 value)
        event AttemptStarted(address indexed player, uint256 ticketId, uint256 snapshot)
        event PrizeWon(address indexed player, uint256 ticketId, uint256 amount)
    ]"#
);

/// Connection state of the wallet that signs game transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletStatus {
    Disconnected,
    Connecting,
    Ready(Address),
}

/// Read access to the jackpot contract.
#[async_trait]
pub trait GameReader: Send + Sync {
    fn contract_address(&self) -> Address;

    async fn prize_pool(&self) -> Result<U256>;

    async fn attempt_balance(&self, player: Address) -> Result<U256>;

    async fn ticket(&self, ticket_id: U256) -> Result<TicketRecord>;
}

/// Wallet-backed access: network selection, submission and receipts.
///
/// `submit` only returns the transaction hash. Effects are observed through
/// `wait_for_receipt`.
#[async_trait]
pub trait GameChain: GameReader {
    fn wallet_status(&self) -> WalletStatus;

    async fn active_chain_id(&self) -> Result<u64>;

    async fn switch_chain(&self, chain_id: u64) -> Result<()>;

    async fn submit(&self, call: WriteCall) -> Result<H256>;

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TransactionReceipt>;
}

pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// ethers-backed contract handle, generic over the middleware stack.
pub struct EvmGame<M> {
    contract: GameJackpot<M>,
    client: Arc<M>,
}

impl EvmGame<Provider<Http>> {
    /// Read-only handle used by the signing service.
    pub fn reader_from_config(config: &Config) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid RPC URL: {}", e)))?;
        let address = config
            .contract_address()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(Self::new(address, Arc::new(provider)))
    }
}

impl EvmGame<SignerClient> {
    /// Wallet-backed handle used by the player.
    pub fn wallet_from_config(config: &Config) -> Result<Self> {
        let private_key = config.player_private_key.as_deref().ok_or_else(|| {
            AppError::WalletNotReady("PLAYER_PRIVATE_KEY is not configured".to_string())
        })?;
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| AppError::Internal(format!("Invalid RPC URL: {}", e)))?;
        let wallet = LocalWallet::from_str(private_key.trim().trim_start_matches("0x"))
            .map_err(|_| AppError::WalletNotReady("Player private key is malformed".to_string()))?
            .with_chain_id(config.chain_id);
        let address = config
            .contract_address()
            .map_err(|e| AppError::Internal(e.to_string()))?;
        let client = SignerMiddleware::new(provider, wallet);
        Ok(Self::new(address, Arc::new(client)))
    }
}

impl<M: Middleware + 'static> EvmGame<M> {
    pub fn new(address: Address, client: Arc<M>) -> Self {
        Self {
            contract: GameJackpot::new(address, client.clone()),
            client,
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> GameReader for EvmGame<M> {
    fn contract_address(&self) -> Address {
        self.contract.address()
    }

    async fn prize_pool(&self) -> Result<U256> {
        self.contract
            .prize_pool()
            .call()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))
    }

    async fn attempt_balance(&self, player: Address) -> Result<U256> {
        self.contract
            .attempt_balance(player)
            .call()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))
    }

    async fn ticket(&self, ticket_id: U256) -> Result<TicketRecord> {
        let (owner, prize_snapshot, claimed) = self
            .contract
            .tickets(ticket_id)
            .call()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        Ok(TicketRecord {
            owner,
            prize_snapshot,
            claimed,
        })
    }
}

#[async_trait]
impl GameChain for EvmGame<SignerClient> {
    fn wallet_status(&self) -> WalletStatus {
        WalletStatus::Ready(self.client.address())
    }

    async fn active_chain_id(&self) -> Result<u64> {
        let chain_id = self
            .client
            .get_chainid()
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?;
        Ok(chain_id.as_u64())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        // A key-backed wallet follows its RPC endpoint; it cannot hop networks.
        let active = self.active_chain_id().await?;
        if active == chain_id {
            return Ok(());
        }
        Err(AppError::WrongNetwork {
            expected: chain_id,
            active,
        })
    }

    async fn submit(&self, call: WriteCall) -> Result<H256> {
        let label = call.label();
        let tx_hash = match call {
            WriteCall::BuyAttempts(pack) => {
                let request = self
                    .contract
                    .method::<_, ()>(pack.function_name(), ())
                    .map_err(|e| AppError::Internal(format!("ABI error: {}", e)))?
                    .value(pack.price_wei());
                let pending = request
                    .send()
                    .await
                    .map_err(|e| AppError::Transaction(e.to_string()))?;
                *pending
            }
            WriteCall::StartAttempt => {
                let request = self.contract.start_attempt();
                let pending = request
                    .send()
                    .await
                    .map_err(|e| AppError::Transaction(e.to_string()))?;
                *pending
            }
            WriteCall::ClaimPrize(attestation) => {
                let request = self.contract.claim_prize(
                    attestation.ticket_id,
                    attestation.prize_snapshot,
                    attestation.nonce,
                    attestation.expires_at,
                    Bytes::from(attestation.signature),
                );
                let pending = request
                    .send()
                    .await
                    .map_err(|e| AppError::Transaction(e.to_string()))?;
                *pending
            }
        };
        tracing::info!("Submitted {} transaction {:?}", label, tx_hash);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TransactionReceipt> {
        PendingTransaction::new(tx_hash, self.client.inner())
            .await
            .map_err(|e| AppError::BlockchainRPC(e.to_string()))?
            .ok_or_else(|| {
                AppError::Transaction(format!("Transaction {:?} was dropped", tx_hash))
            })
    }
}
