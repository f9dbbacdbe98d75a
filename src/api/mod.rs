// src/api/mod.rs

pub mod health;
pub mod sign_win;

use std::sync::Arc;

use crate::config::Config;
use crate::services::WinSigner;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub signer: Arc<WinSigner>,
}
