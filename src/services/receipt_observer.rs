use ethers::abi::RawLog;
use ethers::contract::EthLogDecode;
use ethers::types::{Address, Log, TransactionReceipt, H256, U256};

use super::onchain::{AttemptStartedFilter, AttemptsPurchasedFilter, PrizeWonFilter};
use crate::error::{AppError, Result};

/// Domain facts recovered from a confirmed receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    AttemptsPurchased {
        player: Address,
        count: U256,
        value: U256,
    },
    AttemptStarted {
        player: Address,
        ticket_id: U256,
        snapshot: U256,
    },
    PrizeWon {
        player: Address,
        ticket_id: U256,
        amount: U256,
    },
}

/// A receipt that landed with `status == 1`, plus the game events it emitted.
#[derive(Debug, Clone)]
pub struct ConfirmedReceipt {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub events: Vec<GameEvent>,
}

impl ConfirmedReceipt {
    pub fn attempt_started(&self) -> Option<(U256, U256)> {
        self.events.iter().find_map(|event| match event {
            GameEvent::AttemptStarted {
                ticket_id,
                snapshot,
                ..
            } => Some((*ticket_id, *snapshot)),
            _ => None,
        })
    }

    pub fn prize_won(&self) -> Option<U256> {
        self.events.iter().find_map(|event| match event {
            GameEvent::PrizeWon { amount, .. } => Some(*amount),
            _ => None,
        })
    }
}

/// Turns raw receipts for one contract into typed game events.
#[derive(Debug, Clone, Copy)]
pub struct ReceiptObserver {
    contract: Address,
}

impl ReceiptObserver {
    pub fn new(contract: Address) -> Self {
        Self { contract }
    }

    /// Rejects reverted receipts and decodes every game event in the rest.
    pub fn confirm(&self, receipt: &TransactionReceipt) -> Result<ConfirmedReceipt> {
        let succeeded = receipt
            .status
            .map(|status| status.as_u64() == 1)
            .unwrap_or(false);
        if !succeeded {
            return Err(AppError::Transaction(format!(
                "Transaction {:?} reverted",
                receipt.transaction_hash
            )));
        }

        let events = receipt
            .logs
            .iter()
            .filter(|log| log.address == self.contract)
            .filter_map(decode_game_event)
            .collect();

        Ok(ConfirmedReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            events,
        })
    }
}

// Logs from other contracts or with unknown topics are skipped.
fn decode_game_event(log: &Log) -> Option<GameEvent> {
    let raw = RawLog {
        topics: log.topics.clone(),
        data: log.data.to_vec(),
    };

    if let Ok(event) = AttemptStartedFilter::decode_log(&raw) {
        return Some(GameEvent::AttemptStarted {
            player: event.player,
            ticket_id: event.ticket_id,
            snapshot: event.snapshot,
        });
    }
    if let Ok(event) = AttemptsPurchasedFilter::decode_log(&raw) {
        return Some(GameEvent::AttemptsPurchased {
            player: event.player,
            count: event.count,
            value: event.value,
        });
    }
    if let Ok(event) = PrizeWonFilter::decode_log(&raw) {
        return Some(GameEvent::PrizeWon {
            player: event.player,
            ticket_id: event.ticket_id,
            amount: event.amount,
        });
    }
    None
}
