use ethers::abi::{encode, Token};
use ethers::types::{Address, H256, U256};

use super::hash::{keccak256, keccak256_concat};
use crate::constants::{
    EIP712_DOMAIN_NAME, EIP712_DOMAIN_TYPE, EIP712_DOMAIN_VERSION, EIP712_WIN_TYPE,
};

/// EIP-712 domain bound to one contract on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinDomain {
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl WinDomain {
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            chain_id,
            verifying_contract,
        }
    }

    pub fn separator(&self) -> H256 {
        let encoded = encode(&[
            Token::FixedBytes(keccak256(EIP712_DOMAIN_TYPE.as_bytes()).to_vec()),
            Token::FixedBytes(keccak256(EIP712_DOMAIN_NAME.as_bytes()).to_vec()),
            Token::FixedBytes(keccak256(EIP712_DOMAIN_VERSION.as_bytes()).to_vec()),
            Token::Uint(U256::from(self.chain_id)),
            Token::Address(self.verifying_contract),
        ]);
        H256::from(keccak256(&encoded))
    }
}

/// The `Win` message authorizing a prize claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinMessage {
    pub player: Address,
    pub ticket_id: U256,
    pub prize_snapshot: U256,
    pub nonce: U256,
    pub expires_at: U256,
}

impl WinMessage {
    pub fn struct_hash(&self) -> H256 {
        let encoded = encode(&[
            Token::FixedBytes(keccak256(EIP712_WIN_TYPE.as_bytes()).to_vec()),
            Token::Address(self.player),
            Token::Uint(self.ticket_id),
            Token::Uint(self.prize_snapshot),
            Token::Uint(self.nonce),
            Token::Uint(self.expires_at),
        ]);
        H256::from(keccak256(&encoded))
    }

    /// Final digest: keccak256("\x19\x01" || domainSeparator || structHash).
    pub fn signing_digest(&self, domain: &WinDomain) -> H256 {
        let separator = domain.separator();
        let struct_hash = self.struct_hash();
        H256::from(keccak256_concat(&[
            b"\x19\x01",
            separator.as_bytes(),
            struct_hash.as_bytes(),
        ]))
    }
}
