//! In-memory stand-ins for the jackpot contract and the session backend.

use async_trait::async_trait;
use chrono::Utc;
use ethers::abi::{encode, Token};
use ethers::contract::EthEvent;
use ethers::types::{Address, Bytes, Log, TransactionReceipt, H256, U256};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{
    constants::{DEFAULT_ROW_SIZES, LETTERS, ROW_COUNT},
    crypto::{signer::recover_signer, SignerKey, WinDomain, WinMessage},
    error::{AppError, Result},
    integrations::session_backend::SessionBackend,
    models::{
        ClickResponse, ClickResult, FinishResponse, SessionStatus, SessionStatusResponse,
        StartSessionResponse, TicketRecord, WriteCall,
    },
    services::onchain::{
        AttemptStartedFilter, AttemptsPurchasedFilter, GameChain, GameReader, PrizeWonFilter,
        WalletStatus,
    },
};

pub const REQUIRED_CHAIN: u64 = 8453;

// Anvil's second dev account; stands in for the sign-win key.
pub const SIGNER_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub fn contract_address() -> Address {
    Address::from_low_u64_be(0xbeef)
}

pub fn player_address() -> Address {
    Address::from_low_u64_be(0xa11ce)
}

pub fn signer_key() -> SignerKey {
    SignerKey::from_hex(SIGNER_KEY).unwrap()
}

pub fn win_domain() -> WinDomain {
    WinDomain::new(REQUIRED_CHAIN, contract_address())
}

fn address_topic(address: Address) -> H256 {
    let mut topic = [0u8; 32];
    topic[12..].copy_from_slice(address.as_bytes());
    H256::from(topic)
}

fn event_log(contract: Address, signature: H256, player: Address, data: &[U256]) -> Log {
    let tokens: Vec<Token> = data.iter().map(|value| Token::Uint(*value)).collect();
    Log {
        address: contract,
        topics: vec![signature, address_topic(player)],
        data: Bytes::from(encode(&tokens)),
        ..Default::default()
    }
}

pub fn attempts_purchased_log(contract: Address, player: Address, count: U256, value: U256) -> Log {
    event_log(contract, AttemptsPurchasedFilter::signature(), player, &[count, value])
}

pub fn attempt_started_log(
    contract: Address,
    player: Address,
    ticket_id: U256,
    snapshot: U256,
) -> Log {
    event_log(
        contract,
        AttemptStartedFilter::signature(),
        player,
        &[ticket_id, snapshot],
    )
}

pub fn prize_won_log(contract: Address, player: Address, ticket_id: U256, amount: U256) -> Log {
    event_log(contract, PrizeWonFilter::signature(), player, &[ticket_id, amount])
}

pub fn confirmed_receipt(logs: Vec<Log>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: H256::from_low_u64_be(1),
        block_number: Some(1u64.into()),
        status: Some(1u64.into()),
        logs,
        ..Default::default()
    }
}

struct ChainState {
    wallet: WalletStatus,
    active_chain: u64,
    refuse_switch: bool,
    fail_balance_reads: bool,
    prize_pool: U256,
    balances: HashMap<Address, u64>,
    tickets: HashMap<U256, TicketRecord>,
    next_ticket_id: u64,
    attestation_signer: Option<Address>,
    revert_next: Option<String>,
    submitted: Vec<&'static str>,
    receipts: HashMap<H256, TransactionReceipt>,
    block: u64,
}

/// Contract semantics the flow depends on: balances, tickets, pool and
/// claim verification against the sign-win key.
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                wallet: WalletStatus::Ready(player_address()),
                active_chain: REQUIRED_CHAIN,
                refuse_switch: false,
                fail_balance_reads: false,
                prize_pool: U256::zero(),
                balances: HashMap::new(),
                tickets: HashMap::new(),
                next_ticket_id: 1,
                attestation_signer: Some(signer_key().address()),
                revert_next: None,
                submitted: Vec::new(),
                receipts: HashMap::new(),
                block: 0,
            }),
        }
    }

    pub fn player(&self) -> Address {
        player_address()
    }

    pub fn set_wallet(&self, wallet: WalletStatus) {
        self.state.lock().unwrap().wallet = wallet;
    }

    pub fn set_active_chain(&self, chain_id: u64) {
        self.state.lock().unwrap().active_chain = chain_id;
    }

    pub fn active_chain(&self) -> u64 {
        self.state.lock().unwrap().active_chain
    }

    pub fn refuse_switch(&self) {
        self.state.lock().unwrap().refuse_switch = true;
    }

    pub fn set_balance(&self, player: Address, count: u64) {
        self.state.lock().unwrap().balances.insert(player, count);
    }

    pub fn balance_of(&self, player: Address) -> u64 {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(&player)
            .copied()
            .unwrap_or(0)
    }

    pub fn set_prize_pool(&self, wei: u64) {
        self.set_prize_pool_wei(U256::from(wei));
    }

    pub fn set_prize_pool_wei(&self, wei: U256) {
        self.state.lock().unwrap().prize_pool = wei;
    }

    pub fn prize_pool_now(&self) -> U256 {
        self.state.lock().unwrap().prize_pool
    }

    pub fn set_next_ticket_id(&self, ticket_id: u64) {
        self.state.lock().unwrap().next_ticket_id = ticket_id;
    }

    pub fn insert_ticket(&self, ticket_id: u64, record: TicketRecord) {
        self.state
            .lock()
            .unwrap()
            .tickets
            .insert(U256::from(ticket_id), record);
    }

    pub fn ticket_record(&self, ticket_id: u64) -> Option<TicketRecord> {
        self.state
            .lock()
            .unwrap()
            .tickets
            .get(&U256::from(ticket_id))
            .cloned()
    }

    /// Next submission fails with this revert text.
    /// Makes every later `attempt_balance` read fail like a dropped RPC.
    pub fn fail_balance_reads(&self) {
        self.state.lock().unwrap().fail_balance_reads = true;
    }

    pub fn revert_next(&self, reason: &str) {
        self.state.lock().unwrap().revert_next = Some(reason.to_string());
    }

    pub fn submitted(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn apply(
        state: &mut ChainState,
        player: Address,
        call: &WriteCall,
    ) -> std::result::Result<Vec<Log>, String> {
        let contract = contract_address();
        match call {
            WriteCall::BuyAttempts(pack) => {
                *state.balances.entry(player).or_insert(0) += pack.count();
                Ok(vec![attempts_purchased_log(
                    contract,
                    player,
                    U256::from(pack.count()),
                    pack.price_wei(),
                )])
            }
            WriteCall::StartAttempt => {
                let balance = state.balances.entry(player).or_insert(0);
                if *balance == 0 {
                    return Err("execution reverted: NoAttemptsLeft".to_string());
                }
                *balance -= 1;
                let ticket_id = U256::from(state.next_ticket_id);
                state.next_ticket_id += 1;
                let snapshot = state.prize_pool;
                state.tickets.insert(
                    ticket_id,
                    TicketRecord {
                        owner: player,
                        prize_snapshot: snapshot,
                        claimed: false,
                    },
                );
                Ok(vec![attempt_started_log(contract, player, ticket_id, snapshot)])
            }
            WriteCall::ClaimPrize(attestation) => {
                let ticket = state
                    .tickets
                    .get(&attestation.ticket_id)
                    .cloned()
                    .ok_or_else(|| "execution reverted: InvalidTicket".to_string())?;
                if ticket.owner != player {
                    return Err("execution reverted: NotTicketOwner".to_string());
                }
                if ticket.claimed {
                    return Err("execution reverted: AlreadyClaimed".to_string());
                }
                if ticket.prize_snapshot != attestation.prize_snapshot {
                    return Err("execution reverted: SnapshotMismatch".to_string());
                }
                if attestation.expires_at < U256::from(Utc::now().timestamp() as u64) {
                    return Err("execution reverted: SignatureExpired".to_string());
                }
                let digest = WinMessage {
                    player,
                    ticket_id: attestation.ticket_id,
                    prize_snapshot: attestation.prize_snapshot,
                    nonce: attestation.nonce,
                    expires_at: attestation.expires_at,
                }
                .signing_digest(&win_domain());
                let recovered = recover_signer(digest, &attestation.signature).ok();
                if recovered.is_none() || recovered != state.attestation_signer {
                    return Err("execution reverted: InvalidSignature".to_string());
                }
                if state.prize_pool < ticket.prize_snapshot {
                    return Err("execution reverted: InsufficientPool".to_string());
                }
                state.prize_pool -= ticket.prize_snapshot;
                if let Some(record) = state.tickets.get_mut(&attestation.ticket_id) {
                    record.claimed = true;
                }
                Ok(vec![prize_won_log(
                    contract,
                    player,
                    attestation.ticket_id,
                    ticket.prize_snapshot,
                )])
            }
        }
    }
}

#[async_trait]
impl GameReader for MockChain {
    fn contract_address(&self) -> Address {
        contract_address()
    }

    async fn prize_pool(&self) -> Result<U256> {
        Ok(self.prize_pool_now())
    }

    async fn attempt_balance(&self, player: Address) -> Result<U256> {
        if self.state.lock().unwrap().fail_balance_reads {
            return Err(AppError::BlockchainRPC("connection reset".to_string()));
        }
        Ok(U256::from(self.balance_of(player)))
    }

    async fn ticket(&self, ticket_id: U256) -> Result<TicketRecord> {
        // Unknown ids read back as the zero record, like a solidity mapping.
        Ok(self
            .state
            .lock()
            .unwrap()
            .tickets
            .get(&ticket_id)
            .cloned()
            .unwrap_or(TicketRecord {
                owner: Address::zero(),
                prize_snapshot: U256::zero(),
                claimed: false,
            }))
    }
}

#[async_trait]
impl GameChain for MockChain {
    fn wallet_status(&self) -> WalletStatus {
        self.state.lock().unwrap().wallet
    }

    async fn active_chain_id(&self) -> Result<u64> {
        Ok(self.active_chain())
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_switch {
            return Err(AppError::Transaction("User rejected the request.".to_string()));
        }
        state.active_chain = chain_id;
        Ok(())
    }

    async fn submit(&self, call: WriteCall) -> Result<H256> {
        let mut state = self.state.lock().unwrap();
        let player = match state.wallet {
            WalletStatus::Ready(address) => address,
            _ => return Err(AppError::WalletNotReady("Wallet is not connected".to_string())),
        };
        if let Some(reason) = state.revert_next.take() {
            return Err(AppError::Transaction(reason));
        }
        let logs = Self::apply(&mut state, player, &call).map_err(AppError::Transaction)?;

        state.block += 1;
        state.submitted.push(call.label());
        let tx_hash = H256::from_low_u64_be(state.block);
        let receipt = TransactionReceipt {
            transaction_hash: tx_hash,
            block_number: Some(state.block.into()),
            status: Some(1u64.into()),
            logs,
            ..Default::default()
        };
        state.receipts.insert(tx_hash, receipt);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<TransactionReceipt> {
        self.state
            .lock()
            .unwrap()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| AppError::Transaction(format!("Transaction {:?} was dropped", tx_hash)))
    }
}

struct MockSession {
    player: Address,
    prize_snapshot: U256,
    row_sizes: [usize; ROW_COUNT],
    letter_cols: [usize; ROW_COUNT],
    current_row: usize,
    status: SessionStatus,
    started: bool,
}

struct BackendState {
    sessions: HashMap<U256, MockSession>,
    fail_start: Option<String>,
    stall_start: bool,
    flag_bot: bool,
    calls: Vec<String>,
}

/// Session store scripted per ticket; signs wins with the sign-win key.
pub struct MockBackend {
    state: Mutex<BackendState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState {
                sessions: HashMap::new(),
                fail_start: None,
                stall_start: false,
                flag_bot: false,
                calls: Vec::new(),
            }),
        }
    }

    /// Fixes the layout for `ticket_id`; the player is bound on `start`.
    pub fn open_session(
        &self,
        ticket_id: u64,
        row_sizes: [usize; ROW_COUNT],
        letter_cols: [usize; ROW_COUNT],
    ) {
        self.state.lock().unwrap().sessions.insert(
            U256::from(ticket_id),
            MockSession {
                player: player_address(),
                prize_snapshot: U256::zero(),
                row_sizes,
                letter_cols,
                current_row: 0,
                status: SessionStatus::Playing,
                started: false,
            },
        );
    }

    pub fn fail_start(&self, error: &str) {
        self.state.lock().unwrap().fail_start = Some(error.to_string());
    }

    /// `start` never answers, like a hung request.
    pub fn stall_start(&self) {
        self.state.lock().unwrap().stall_start = true;
    }

    /// Next click is classified as automated play.
    pub fn flag_bot(&self) {
        self.state.lock().unwrap().flag_bot = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn click_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with("click"))
            .count()
    }
}

#[async_trait]
impl SessionBackend for MockBackend {
    async fn start_game(
        &self,
        ticket_id: U256,
        player: Address,
        prize_snapshot: U256,
    ) -> Result<StartSessionResponse> {
        let stalled = self.state.lock().unwrap().stall_start;
        if stalled {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("start {}", ticket_id));
        if let Some(error) = state.fail_start.take() {
            return Err(AppError::Backend(error));
        }
        let session = state.sessions.entry(ticket_id).or_insert(MockSession {
            player,
            prize_snapshot,
            row_sizes: DEFAULT_ROW_SIZES,
            letter_cols: [0; ROW_COUNT],
            current_row: 0,
            status: SessionStatus::Playing,
            started: false,
        });
        if session.status != SessionStatus::Playing {
            return Err(AppError::Backend("Game already finished".to_string()));
        }
        let resumed = session.started;
        session.started = true;
        session.player = player;
        session.prize_snapshot = prize_snapshot;
        Ok(StartSessionResponse {
            success: true,
            row_sizes: session.row_sizes.to_vec(),
            current_row: session.current_row,
            current_letter: LETTERS[session.current_row].to_string(),
            hits_count: session.current_row as u32,
            resumed: resumed.then_some(true),
            error: None,
        })
    }

    async fn click(&self, ticket_id: U256, row: usize, col: usize) -> Result<ClickResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("click {} {} {}", ticket_id, row, col));
        let bot = std::mem::take(&mut state.flag_bot);
        let session = state
            .sessions
            .get_mut(&ticket_id)
            .filter(|session| session.started)
            .ok_or_else(|| AppError::Backend("Game not found".to_string()))?;
        if session.status != SessionStatus::Playing {
            return Err(AppError::Backend("Game is not active".to_string()));
        }
        if row != session.current_row {
            return Err(AppError::Backend("Invalid row".to_string()));
        }

        if bot {
            session.status = SessionStatus::Lost;
            return Ok(ClickResponse {
                result: ClickResult::BotDetected,
                letter: None,
                next_letter: None,
                next_row: None,
                game_status: SessionStatus::Lost,
                message: Some("Suspicious activity detected".to_string()),
                error: None,
            });
        }
        if session.letter_cols[row] != col {
            session.status = SessionStatus::Lost;
            return Ok(ClickResponse {
                result: ClickResult::Miss,
                letter: None,
                next_letter: None,
                next_row: None,
                game_status: SessionStatus::Lost,
                message: Some("Skull!".to_string()),
                error: None,
            });
        }

        session.current_row += 1;
        let won = session.current_row == ROW_COUNT;
        if won {
            session.status = SessionStatus::Won;
        }
        Ok(ClickResponse {
            result: ClickResult::Hit,
            letter: Some(LETTERS[row].to_string()),
            next_letter: (!won).then(|| LETTERS[session.current_row].to_string()),
            next_row: (!won).then_some(session.current_row),
            game_status: session.status,
            message: None,
            error: None,
        })
    }

    async fn finish(&self, ticket_id: U256) -> Result<FinishResponse> {
        let (player, prize_snapshot) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("finish {}", ticket_id));
            let session = state
                .sessions
                .get(&ticket_id)
                .ok_or_else(|| AppError::Backend("Game not found".to_string()))?;
            if session.status != SessionStatus::Won {
                return Err(AppError::Backend("Game not won".to_string()));
            }
            (session.player, session.prize_snapshot)
        };

        let nonce = U256::from(Utc::now().timestamp_millis() as u64);
        let expires_at = U256::from((Utc::now().timestamp() + 600) as u64);
        let digest = WinMessage {
            player,
            ticket_id,
            prize_snapshot,
            nonce,
            expires_at,
        }
        .signing_digest(&win_domain());
        let signature = signer_key().sign_digest(digest)?;
        Ok(FinishResponse {
            success: Some(true),
            nonce: Some(nonce.to_string()),
            expires_at: Some(expires_at.to_string()),
            signature: Some(format!("0x{}", hex::encode(signature))),
            error: None,
            status: Some("won".to_string()),
        })
    }

    async fn status(&self, ticket_id: U256) -> Result<SessionStatusResponse> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("status {}", ticket_id));
        let session = state
            .sessions
            .get(&ticket_id)
            .ok_or_else(|| AppError::Backend("Game not found".to_string()))?;
        Ok(SessionStatusResponse {
            ticket_id: ticket_id.to_string(),
            status: session.status,
            current_row: session.current_row,
            hits_count: session.current_row as u32,
            row_sizes: session.row_sizes.to_vec(),
            elapsed_time: 0,
        })
    }
}
