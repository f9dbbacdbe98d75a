// src/models/mod.rs
pub mod game;

// Re-export commonly used types so other modules can use `crate::models::X`
pub use game::{
    parse_u256, ClaimAttestation, ClickRequest, ClickResponse, ClickResult, FinishRequest,
    FinishResponse, GameTicket, SessionStatus, SessionStatusResponse, StartSessionRequest,
    StartSessionResponse, TicketPack, TicketRecord, WriteCall,
};
