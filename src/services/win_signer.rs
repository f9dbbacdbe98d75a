use chrono::Utc;
use ethers::types::{Address, U256};
use rand::Rng;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use super::onchain::GameReader;
use crate::{
    constants::{NONCE_RANDOM_SPAN, WIN_SIGNATURE_TTL_SECS},
    crypto::{SignerKey, WinDomain, WinMessage},
    error::{AppError, Result},
};

/// Signed `Win` authorization, serialized as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinSignature {
    pub success: bool,
    pub nonce: String,
    pub expires_at: String,
    pub signature: String,
}

/// Issues claim signatures after re-validating the ticket against live chain
/// state. Nothing is signed unless every check passes.
pub struct WinSigner {
    reader: Arc<dyn GameReader>,
    key: Option<SignerKey>,
    domain: WinDomain,
}

impl WinSigner {
    pub fn new(reader: Arc<dyn GameReader>, key: Option<SignerKey>, chain_id: u64) -> Self {
        let domain = WinDomain::new(chain_id, reader.contract_address());
        Self {
            reader,
            key,
            domain,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    /// Validates and signs.
    ///
    /// # Arguments
    /// * `player` - Claimant address as sent by the client.
    /// * `ticket_id` - Decimal ticket id.
    /// * `prize_snapshot` - Decimal prize snapshot; compared to the on-chain value as text.
    ///
    /// # Returns
    /// * `Ok(WinSignature)` - Nonce, expiry and 65-byte signature, hex encoded.
    /// * `Err(AppError)` - `BadRequest`, `Forbidden` or `SignerNotConfigured`, or an RPC failure.
    pub async fn issue(
        &self,
        player: &str,
        ticket_id: &str,
        prize_snapshot: &str,
    ) -> Result<WinSignature> {
        if player.trim().is_empty() || ticket_id.trim().is_empty() || prize_snapshot.trim().is_empty() {
            return Err(missing_fields());
        }
        let key = self.key.as_ref().ok_or_else(|| {
            tracing::error!("SIGNER_PRIVATE_KEY not configured");
            AppError::SignerNotConfigured
        })?;

        let player = Address::from_str(player.trim())
            .map_err(|_| AppError::BadRequest("Invalid player address".to_string()))?;
        let ticket_id = U256::from_dec_str(ticket_id.trim())
            .map_err(|_| AppError::BadRequest("Invalid ticketId".to_string()))?;

        let ticket = self.reader.ticket(ticket_id).await?;
        if ticket.owner != player {
            tracing::warn!(
                "sign-win refused: ticket {} owned by {:?}, requested by {:?}",
                ticket_id,
                ticket.owner,
                player
            );
            return Err(AppError::Forbidden(
                "Ticket does not belong to this player".to_string(),
            ));
        }
        if ticket.claimed {
            return Err(AppError::BadRequest("Prize already claimed".to_string()));
        }
        // Exact decimal text; "0999" or "999.0" do not match 999.
        if ticket.prize_snapshot.to_string() != prize_snapshot {
            return Err(AppError::BadRequest("Prize snapshot mismatch".to_string()));
        }

        let pool = self.reader.prize_pool().await?;
        if pool < ticket.prize_snapshot {
            return Err(AppError::BadRequest("Insufficient prize pool".to_string()));
        }

        let nonce = fresh_nonce();
        let expires_at = U256::from((Utc::now().timestamp() + WIN_SIGNATURE_TTL_SECS) as u64);
        let digest = WinMessage {
            player,
            ticket_id,
            prize_snapshot: ticket.prize_snapshot,
            nonce,
            expires_at,
        }
        .signing_digest(&self.domain);
        let signature = key.sign_digest(digest)?;

        tracing::info!(
            "Signed win for ticket {} (player {:?}, prize {})",
            ticket_id,
            player,
            ticket.prize_snapshot
        );
        Ok(WinSignature {
            success: true,
            nonce: nonce.to_string(),
            expires_at: expires_at.to_string(),
            signature: format!("0x{}", hex::encode(signature)),
        })
    }
}

pub fn missing_fields() -> AppError {
    AppError::BadRequest("Missing required fields: player, ticketId, prizeSnapshot".to_string())
}

// Millisecond clock shifted past a random suffix so rapid requests differ.
fn fresh_nonce() -> U256 {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let salt = rand::rng().random_range(0..NONCE_RANDOM_SPAN);
    U256::from(millis) * U256::from(NONCE_RANDOM_SPAN) + U256::from(salt)
}
