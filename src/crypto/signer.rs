use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature, H256};
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, Result};

/// Process-held signing key. The only operation exposed over the secret is
/// signing a prehashed digest.
pub struct SignerKey {
    wallet: LocalWallet,
}

impl SignerKey {
    pub fn from_hex(private_key: &str) -> Result<Self> {
        let trimmed = private_key.trim();
        let normalized = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let wallet = LocalWallet::from_str(normalized)
            .map_err(|_| AppError::Internal("Signer private key is malformed".to_string()))?;
        Ok(Self { wallet })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// Signs an EIP-712 digest and returns the 65-byte `r || s || v` form.
    pub fn sign_digest(&self, digest: H256) -> Result<Vec<u8>> {
        let signature = self
            .wallet
            .sign_hash(digest)
            .map_err(|e| AppError::Internal(format!("Signing failed: {}", e)))?;
        Ok(signature.to_vec())
    }
}

impl fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignerKey")
            .field("address", &self.address())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Recovers the address that produced `signature` over `digest`.
pub fn recover_signer(digest: H256, signature: &[u8]) -> Result<Address> {
    let signature = Signature::try_from(signature).map_err(|_| AppError::InvalidSignature)?;
    signature
        .recover(digest)
        .map_err(|_| AppError::InvalidSignature)
}
