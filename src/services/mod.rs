// All service modules
pub mod contract_gateway;
pub mod flow_coordinator;
pub mod onchain;
pub mod puzzle_engine;
pub mod receipt_observer;
pub mod win_signer;

// Re-export for convenience
pub use contract_gateway::ContractGateway;
pub use flow_coordinator::{FlowCoordinator, FlowSnapshot, FlowState};
pub use onchain::{EvmGame, GameChain, GameReader, WalletStatus};
pub use puzzle_engine::{Puzzle, PuzzleStatus, PuzzleView, RevealOutcome};
pub use receipt_observer::{ConfirmedReceipt, GameEvent, ReceiptObserver};
pub use win_signer::{WinSignature, WinSigner};
