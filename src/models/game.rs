use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{PRICE_FIFTY_WEI, PRICE_SINGLE_WEI, PRICE_TEN_WEI};
use crate::error::{AppError, Result};

/// On-chain ticket record as returned by `tickets(id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRecord {
    pub owner: Address,
    pub prize_snapshot: U256,
    pub claimed: bool,
}

/// Ticket created by `startAttempt`, mirrored client-side as the current ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameTicket {
    pub ticket_id: U256,
    pub prize_snapshot: U256,
}

/// Signed authorization for one ticket's claim transaction.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ClaimAttestation {
    pub ticket_id: U256,
    pub prize_snapshot: U256,
    pub nonce: U256,
    pub expires_at: U256,
    pub signature: Vec<u8>,
}

impl ClaimAttestation {
    /// Whether this attestation authorizes a claim for `ticket`.
    pub fn matches(&self, ticket: &GameTicket) -> bool {
        self.ticket_id == ticket.ticket_id && self.prize_snapshot == ticket.prize_snapshot
    }

    pub fn signature_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.signature))
    }
}

impl fmt::Debug for ClaimAttestation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimAttestation")
            .field("ticket_id", &self.ticket_id)
            .field("prize_snapshot", &self.prize_snapshot)
            .field("nonce", &self.nonce)
            .field("expires_at", &self.expires_at)
            .field("signature", &self.signature_hex())
            .finish()
    }
}

/// Purchasable ticket bundles with their fixed prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TicketPack {
    Single,
    Ten,
    Fifty,
}

impl TicketPack {
    pub fn count(self) -> u64 {
        match self {
            TicketPack::Single => 1,
            TicketPack::Ten => 10,
            TicketPack::Fifty => 50,
        }
    }

    pub fn price_wei(self) -> U256 {
        match self {
            TicketPack::Single => U256::from(PRICE_SINGLE_WEI),
            TicketPack::Ten => U256::from(PRICE_TEN_WEI),
            TicketPack::Fifty => U256::from(PRICE_FIFTY_WEI),
        }
    }

    pub fn function_name(self) -> &'static str {
        match self {
            TicketPack::Single => "buyAttempt",
            TicketPack::Ten => "buyAttempts10",
            TicketPack::Fifty => "buyAttempts50",
        }
    }
}

impl TryFrom<u64> for TicketPack {
    type Error = AppError;

    fn try_from(count: u64) -> Result<Self> {
        match count {
            1 => Ok(TicketPack::Single),
            10 => Ok(TicketPack::Ten),
            50 => Ok(TicketPack::Fifty),
            other => Err(AppError::BadRequest(format!(
                "Tickets are sold in packs of 1, 10 or 50 (got {})",
                other
            ))),
        }
    }
}

/// State-changing contract calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    BuyAttempts(TicketPack),
    StartAttempt,
    ClaimPrize(ClaimAttestation),
}

impl WriteCall {
    pub fn label(&self) -> &'static str {
        match self {
            WriteCall::BuyAttempts(pack) => pack.function_name(),
            WriteCall::StartAttempt => "startAttempt",
            WriteCall::ClaimPrize(_) => "claimPrize",
        }
    }
}

/// Session status as held by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Playing,
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickResult {
    Hit,
    Miss,
    BotDetected,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub ticket_id: String,
    pub player: String,
    pub prize_snapshot: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub row_sizes: Vec<usize>,
    #[serde(default)]
    pub current_row: usize,
    #[serde(default)]
    pub current_letter: String,
    #[serde(default)]
    pub hits_count: u32,
    #[serde(default)]
    pub resumed: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRequest {
    pub ticket_id: String,
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickResponse {
    pub result: ClickResult,
    #[serde(default)]
    pub letter: Option<String>,
    #[serde(default)]
    pub next_letter: Option<String>,
    #[serde(default)]
    pub next_row: Option<usize>,
    pub game_status: SessionStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    pub ticket_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub ticket_id: String,
    pub status: SessionStatus,
    #[serde(default)]
    pub current_row: usize,
    #[serde(default)]
    pub hits_count: u32,
    #[serde(default)]
    pub row_sizes: Vec<usize>,
    #[serde(default)]
    pub elapsed_time: u64,
}

/// Parses a decimal (or 0x-hex) integer as sent over JSON.
pub fn parse_u256(raw: &str, field: &str) -> Result<U256> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest(format!("{} is empty", field)));
    }
    let parsed = match trimmed.strip_prefix("0x") {
        Some(hex_digits) => U256::from_str_radix(hex_digits, 16).ok(),
        None => U256::from_dec_str(trimmed).ok(),
    };
    parsed.ok_or_else(|| AppError::BadRequest(format!("{} is not a valid integer", field)))
}
