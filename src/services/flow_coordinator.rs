use ethers::types::{Address, U256};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

use super::contract_gateway::ContractGateway;
use super::puzzle_engine::{Puzzle, PuzzleView, RevealOutcome};
use crate::{
    error::{AppError, Result},
    integrations::session_backend::SessionBackend,
    models::{parse_u256, ClaimAttestation, FinishResponse, GameTicket, SessionStatus, TicketPack},
};

/// Position in the purchase, play and claim pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Initial,
    BuyTickets,
    ReadyToPlay,
    StartingAttempt,
    Playing,
    Won,
    Claiming,
    Claimed,
    Lost,
}

/// Read-only view published after every transition.
#[derive(Debug, Clone, Serialize)]
pub struct FlowSnapshot {
    pub state: FlowState,
    pub ticket_balance: u64,
    pub prize_pool: U256,
    pub prize_pool_eth: String,
    pub current_ticket: Option<GameTicket>,
    pub has_attestation: bool,
    pub claimed_amount: Option<U256>,
    pub in_flight: bool,
    pub last_error: Option<String>,
    pub puzzle: Option<PuzzleView>,
}

/// Drives one player through buy, start, play and claim.
///
/// Every transition that depends on a transaction waits for the gateway to
/// observe a confirmed receipt. Actions are gated by the current state and
/// a single in-flight flag.
///
/// Action futures are meant to be polled to completion. A caller that drops
/// one early (timeout, `select!`, Ctrl-C) must call
/// [`FlowCoordinator::abandon_in_flight`] before the next action.
pub struct FlowCoordinator {
    gateway: ContractGateway,
    backend: Arc<dyn SessionBackend>,
    state: FlowState,
    ticket_balance: u64,
    prize_pool: U256,
    current_ticket: Option<GameTicket>,
    attestation: Option<ClaimAttestation>,
    claimed_amount: Option<U256>,
    puzzle: Option<Puzzle>,
    in_flight: bool,
    last_error: Option<String>,
    updates: watch::Sender<FlowSnapshot>,
}

impl FlowCoordinator {
    pub fn new(gateway: ContractGateway, backend: Arc<dyn SessionBackend>) -> Self {
        let (updates, _) = watch::channel(FlowSnapshot {
            state: FlowState::Initial,
            ticket_balance: 0,
            prize_pool: U256::zero(),
            prize_pool_eth: ethers::utils::format_ether(U256::zero()),
            current_ticket: None,
            has_attestation: false,
            claimed_amount: None,
            in_flight: false,
            last_error: None,
            puzzle: None,
        });
        Self {
            gateway,
            backend,
            state: FlowState::Initial,
            ticket_balance: 0,
            prize_pool: U256::zero(),
            current_ticket: None,
            attestation: None,
            claimed_amount: None,
            puzzle: None,
            in_flight: false,
            last_error: None,
            updates,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn ticket_balance(&self) -> u64 {
        self.ticket_balance
    }

    pub fn current_ticket(&self) -> Option<GameTicket> {
        self.current_ticket
    }

    pub fn attestation(&self) -> Option<&ClaimAttestation> {
        self.attestation.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn puzzle(&self) -> Option<&Puzzle> {
        self.puzzle.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<FlowSnapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            state: self.state,
            ticket_balance: self.ticket_balance,
            prize_pool: self.prize_pool,
            prize_pool_eth: ethers::utils::format_ether(self.prize_pool),
            current_ticket: self.current_ticket,
            has_attestation: self.attestation.is_some(),
            claimed_amount: self.claimed_amount,
            in_flight: self.in_flight,
            last_error: self.last_error.clone(),
            puzzle: self.puzzle.as_ref().map(Puzzle::view),
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }

    fn transition(&mut self, next: FlowState) {
        if self.state != next {
            tracing::debug!("flow {:?} -> {:?}", self.state, next);
        }
        self.state = next;
        self.publish();
    }

    fn expect_state(&self, allowed: &[FlowState], action: &str) -> Result<()> {
        if self.in_flight {
            return Err(AppError::InvalidState(format!(
                "Cannot {} while another action is in progress",
                action
            )));
        }
        if !allowed.contains(&self.state) {
            return Err(AppError::InvalidState(format!(
                "Cannot {} in state {:?}",
                action, self.state
            )));
        }
        Ok(())
    }

    fn begin(&mut self, next: FlowState) {
        self.in_flight = true;
        self.last_error = None;
        self.transition(next);
    }

    // Ends the in-flight action, rolls back to `state` and surfaces the error text.
    fn fail<T>(&mut self, state: FlowState, err: AppError) -> Result<T> {
        tracing::warn!("flow action failed in {:?}: {}", self.state, err);
        self.in_flight = false;
        self.last_error = Some(err.to_string());
        self.transition(state);
        Err(err)
    }

    fn succeed(&mut self, state: FlowState) {
        self.in_flight = false;
        self.transition(state);
    }

    /// Releases an action whose future was dropped before it finished.
    ///
    /// `starting_attempt` falls back to `ready_to_play` without a ticket, and
    /// `claiming` falls back to `won`. The transaction may still have landed;
    /// `recover` with the ticket id reads back what the chain holds.
    pub fn abandon_in_flight(&mut self) -> FlowState {
        if !self.in_flight {
            return self.state;
        }
        let rollback = match self.state {
            FlowState::StartingAttempt => {
                self.clear_round();
                FlowState::ReadyToPlay
            }
            FlowState::Claiming => FlowState::Won,
            other => other,
        };
        tracing::warn!("abandoning interrupted action in {:?}", self.state);
        self.in_flight = false;
        self.last_error = Some("Action interrupted before completion".to_string());
        self.transition(rollback);
        rollback
    }

    fn clear_round(&mut self) {
        self.current_ticket = None;
        self.attestation = None;
        self.claimed_amount = None;
        self.puzzle = None;
    }

    /// Re-reads ticket balance and prize pool from the chain.
    pub async fn refresh_balances(&mut self) -> Result<()> {
        let player = self.gateway.player()?;
        let balance = self.gateway.read_attempt_balance(player).await?;
        let pool = self.gateway.read_prize_pool().await?;

        self.ticket_balance = balance.min(U256::from(u64::MAX)).as_u64();
        self.prize_pool = pool;
        tracing::debug!(
            "balances: {} ticket(s), prize pool {} ETH",
            self.ticket_balance,
            ethers::utils::format_ether(pool)
        );

        if self.ticket_balance > 0
            && matches!(
                self.state,
                FlowState::Initial | FlowState::Lost | FlowState::Claimed
            )
        {
            self.clear_round();
            self.transition(FlowState::ReadyToPlay);
        } else {
            self.publish();
        }
        Ok(())
    }

    /// Play request from the idle screen.
    pub fn request_play(&mut self) -> Result<FlowState> {
        self.expect_state(&[FlowState::Initial], "request play")?;
        let next = if self.ticket_balance == 0 {
            FlowState::BuyTickets
        } else {
            FlowState::ReadyToPlay
        };
        self.transition(next);
        Ok(next)
    }

    /// Closes the purchase dialog before anything is submitted.
    pub fn cancel_purchase(&mut self) -> Result<()> {
        self.expect_state(&[FlowState::BuyTickets], "cancel purchase")?;
        self.transition(FlowState::Initial);
        Ok(())
    }

    pub async fn buy(&mut self, pack: TicketPack) -> Result<()> {
        self.expect_state(
            &[FlowState::Initial, FlowState::BuyTickets, FlowState::ReadyToPlay],
            "buy tickets",
        )?;
        let previous = self.state;
        self.in_flight = true;
        self.last_error = None;
        self.publish();

        if let Err(e) = self.gateway.buy_attempts(pack).await {
            return self.fail(previous, e);
        }

        // Optimistic until the chain read below lands.
        self.ticket_balance += pack.count();
        self.succeed(FlowState::ReadyToPlay);
        if let Err(e) = self.refresh_balances().await {
            tracing::warn!("balance reconcile after purchase failed: {}", e);
        }
        Ok(())
    }

    /// Spends one ticket on-chain and opens the backend session for it.
    pub async fn start_attempt(&mut self) -> Result<GameTicket> {
        self.expect_state(&[FlowState::ReadyToPlay], "start an attempt")?;
        if self.current_ticket.is_some() {
            return Err(AppError::InvalidState(
                "A ticket is already in play".to_string(),
            ));
        }
        let player = self.gateway.player()?;
        self.begin(FlowState::StartingAttempt);

        let ticket = match self.gateway.start_attempt().await {
            Ok(ticket) => ticket,
            Err(e) => return self.fail(FlowState::ReadyToPlay, e),
        };
        self.ticket_balance = self.ticket_balance.saturating_sub(1);

        // The ticket is spent from here on; a failed session is not refunded.
        match self.open_session(ticket, player, 0).await {
            Ok(()) => {
                self.current_ticket = Some(ticket);
                self.succeed(FlowState::Playing);
                Ok(ticket)
            }
            Err(e) => {
                tracing::error!(
                    "ticket {} confirmed on-chain but session creation failed",
                    ticket.ticket_id
                );
                self.clear_round();
                self.fail(FlowState::ReadyToPlay, e)
            }
        }
    }

    async fn open_session(&mut self, ticket: GameTicket, player: Address, at_row: usize) -> Result<()> {
        let session = self
            .backend
            .start_game(ticket.ticket_id, player, ticket.prize_snapshot)
            .await?;
        if !session.success {
            return Err(AppError::Backend(
                session
                    .error
                    .unwrap_or_else(|| "Failed to start game".to_string()),
            ));
        }
        let mut puzzle =
            Puzzle::server_authoritative(&session.row_sizes, self.backend.clone(), ticket.ticket_id)?;
        puzzle.start();
        let row = session.current_row.max(at_row);
        if row > 0 {
            puzzle.resume(row)?;
        }
        if session.resumed == Some(true) {
            tracing::info!("resumed session for ticket {} at row {}", ticket.ticket_id, row);
        }
        self.puzzle = Some(puzzle);
        Ok(())
    }

    /// Forwards a reveal to the puzzle. Outside `playing` this is a no-op.
    pub async fn reveal(&mut self, row: usize, col: usize) -> Result<RevealOutcome> {
        if self.state != FlowState::Playing || self.in_flight {
            return Ok(RevealOutcome::Ignored);
        }
        let Some(puzzle) = self.puzzle.as_mut() else {
            return Ok(RevealOutcome::Ignored);
        };
        if !puzzle.can_reveal(row, col) {
            return Ok(RevealOutcome::Ignored);
        }

        self.in_flight = true;
        let outcome = puzzle.reveal(row, col).await;
        match outcome {
            Ok(RevealOutcome::Won { letter }) => {
                self.succeed(FlowState::Won);
                Ok(RevealOutcome::Won { letter })
            }
            Ok(RevealOutcome::Lost { bot_detected }) => {
                if bot_detected {
                    self.last_error = Some("Suspicious activity detected".to_string());
                }
                self.succeed(FlowState::Lost);
                Ok(RevealOutcome::Lost { bot_detected })
            }
            Ok(outcome) => {
                self.succeed(FlowState::Playing);
                Ok(outcome)
            }
            Err(e) => self.fail(FlowState::Playing, e),
        }
    }

    /// Fetches the signed claim for the won ticket from the session backend.
    pub async fn request_attestation(&mut self) -> Result<ClaimAttestation> {
        self.expect_state(&[FlowState::Won], "request a claim signature")?;
        let ticket = self
            .current_ticket
            .ok_or_else(|| AppError::InvalidState("No ticket in play".to_string()))?;
        if let Some(existing) = self.attestation.as_ref().filter(|a| a.matches(&ticket)) {
            return Ok(existing.clone());
        }

        self.in_flight = true;
        self.publish();
        let attestation = match self.backend.finish(ticket.ticket_id).await {
            Ok(response) => attestation_from_finish(ticket, response),
            Err(e) => Err(e),
        };
        match attestation {
            Ok(attestation) => {
                self.attestation = Some(attestation.clone());
                self.succeed(FlowState::Won);
                Ok(attestation)
            }
            Err(e) => self.fail(FlowState::Won, e),
        }
    }

    /// Submits the claim; only with an attestation for the current ticket.
    pub async fn claim(&mut self) -> Result<U256> {
        self.expect_state(&[FlowState::Won], "claim")?;
        let ticket = self
            .current_ticket
            .ok_or_else(|| AppError::InvalidState("No ticket in play".to_string()))?;
        let attestation = self
            .attestation
            .clone()
            .filter(|a| a.matches(&ticket))
            .ok_or_else(|| {
                AppError::InvalidState("No claim signature for the current ticket".to_string())
            })?;

        self.begin(FlowState::Claiming);
        match self.gateway.claim_prize(&attestation).await {
            Ok(receipt) => {
                let amount = receipt.prize_won().unwrap_or(ticket.prize_snapshot);
                self.claimed_amount = Some(amount);
                self.attestation = None;
                self.succeed(FlowState::Claimed);
                tracing::info!("ticket {} claimed {} wei", ticket.ticket_id, amount);
                Ok(amount)
            }
            Err(e) => self.fail(FlowState::Won, e),
        }
    }

    /// Leaves a finished round and reconciles balances.
    pub async fn new_game(&mut self) -> Result<FlowState> {
        self.expect_state(&[FlowState::Claimed, FlowState::Lost], "start a new game")?;
        self.clear_round();
        self.last_error = None;
        self.transition(FlowState::Initial);
        if let Err(e) = self.refresh_balances().await {
            tracing::warn!("balance refresh for new game failed: {}", e);
            if self.ticket_balance > 0 {
                self.transition(FlowState::ReadyToPlay);
            }
        }
        Ok(self.state)
    }

    /// Rebuilds the flow for a ticket after a reload, from the on-chain record
    /// and the backend session.
    pub async fn recover(&mut self, ticket_id: U256) -> Result<FlowState> {
        self.expect_state(
            &[FlowState::Initial, FlowState::BuyTickets, FlowState::ReadyToPlay],
            "recover a ticket",
        )?;
        let player = self.gateway.player()?;
        let record = self.gateway.read_ticket(ticket_id).await?;
        if record.owner != player {
            return Err(AppError::Forbidden(
                "Ticket does not belong to the connected wallet".to_string(),
            ));
        }
        let ticket = GameTicket {
            ticket_id,
            prize_snapshot: record.prize_snapshot,
        };
        self.clear_round();
        self.current_ticket = Some(ticket);

        if record.claimed {
            self.claimed_amount = Some(record.prize_snapshot);
            self.transition(FlowState::Claimed);
            return Ok(self.state);
        }

        let session = match self.backend.status(ticket_id).await {
            Ok(session) => session,
            Err(e) => {
                self.clear_round();
                return self.fail(self.state, e);
            }
        };
        match session.status {
            SessionStatus::Playing => {
                if let Err(e) = self.open_session(ticket, player, session.current_row).await {
                    self.clear_round();
                    return self.fail(self.state, e);
                }
                self.transition(FlowState::Playing);
            }
            SessionStatus::Won => {
                self.transition(FlowState::Won);
                self.request_attestation().await?;
            }
            SessionStatus::Lost => self.transition(FlowState::Lost),
        }
        Ok(self.state)
    }
}

fn attestation_from_finish(ticket: GameTicket, response: FinishResponse) -> Result<ClaimAttestation> {
    let missing = || {
        AppError::Backend(
            response
                .error
                .clone()
                .unwrap_or_else(|| "Finish response is missing the claim signature".to_string()),
        )
    };
    let nonce = response.nonce.as_deref().ok_or_else(missing)?;
    let expires_at = response.expires_at.as_deref().ok_or_else(missing)?;
    let signature = response.signature.as_deref().ok_or_else(missing)?;

    let signature = hex::decode(signature.trim_start_matches("0x"))
        .map_err(|_| AppError::Backend("Malformed claim signature".to_string()))?;
    if signature.len() != 65 {
        return Err(AppError::Backend(format!(
            "Claim signature has {} bytes",
            signature.len()
        )));
    }

    Ok(ClaimAttestation {
        ticket_id: ticket.ticket_id,
        prize_snapshot: ticket.prize_snapshot,
        nonce: parse_u256(nonce, "nonce").map_err(|e| AppError::Backend(e.to_string()))?,
        expires_at: parse_u256(expires_at, "expiresAt")
            .map_err(|e| AppError::Backend(e.to_string()))?,
        signature,
    })
}
