use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::constants::{
    BASE_CHAIN_ID, DEFAULT_BACKEND_URL, DEFAULT_GAME_CONTRACT, DEFAULT_RPC_URL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuzzleMode {
    /// Board truth is drawn locally; used for practice rounds.
    Local,
    /// Every reveal is judged by the session backend.
    Server,
}

impl FromStr for PuzzleMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" | "self-contained" => Ok(PuzzleMode::Local),
            "server" | "server-authoritative" => Ok(PuzzleMode::Server),
            other => anyhow::bail!("Unknown PUZZLE_MODE '{}'", other),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Blockchain
    pub rpc_url: String,
    pub chain_id: u64,
    pub game_contract_address: String,

    // Secrets
    pub signer_private_key: Option<String>,
    pub player_private_key: Option<String>,

    // Session backend
    pub backend_url: String,
    pub puzzle_mode: PuzzleMode,

    // CORS
    pub cors_allowed_origins: String,
}

// Secrets stay out of debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("game_contract_address", &self.game_contract_address)
            .field("signer_configured", &self.signer_private_key.is_some())
            .field("player_configured", &self.player_private_key.is_some())
            .field("backend_url", &self.backend_url)
            .field("puzzle_mode", &self.puzzle_mode)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            rpc_url: env::var("BASE_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| BASE_CHAIN_ID.to_string())
                .parse()?,
            game_contract_address: env::var("GAME_CONTRACT_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_GAME_CONTRACT.to_string()),

            signer_private_key: non_empty_var("SIGNER_PRIVATE_KEY"),
            player_private_key: non_empty_var("PLAYER_PRIVATE_KEY"),

            backend_url: env::var("BACKEND_URL")
                .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
            puzzle_mode: env::var("PUZZLE_MODE")
                .unwrap_or_else(|_| "server".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.rpc_url.trim().is_empty() {
            anyhow::bail!("BASE_RPC_URL is empty");
        }
        if self.chain_id == 0 {
            anyhow::bail!("CHAIN_ID must be non-zero");
        }
        let contract = self.contract_address()?;
        if contract == Address::zero() {
            tracing::warn!("Using placeholder game contract address");
        }
        if self.backend_url.trim().is_empty() {
            anyhow::bail!("BACKEND_URL is empty");
        }

        if self.signer_private_key.is_none() {
            tracing::warn!("SIGNER_PRIVATE_KEY not configured; sign-win requests will fail");
        }

        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn contract_address(&self) -> anyhow::Result<Address> {
        Address::from_str(self.game_contract_address.trim()).map_err(|e| {
            anyhow::anyhow!(
                "Invalid GAME_CONTRACT_ADDRESS '{}': {}",
                self.game_contract_address,
                e
            )
        })
    }
}

// Internal helper that reads an env var and drops blank values.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "testnet".to_string(),
        rpc_url: "http://localhost:8545".to_string(),
        chain_id: BASE_CHAIN_ID,
        game_contract_address: DEFAULT_GAME_CONTRACT.to_string(),
        signer_private_key: None,
        player_private_key: None,
        backend_url: "http://localhost:3001".to_string(),
        puzzle_mode: PuzzleMode::Server,
        cors_allowed_origins: "*".to_string(),
    }
}
