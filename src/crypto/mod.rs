pub mod eip712;
pub mod hash;
pub mod signer;

pub use eip712::{WinDomain, WinMessage};
pub use signer::SignerKey;
