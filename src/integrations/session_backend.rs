use async_trait::async_trait;
use ethers::types::{Address, U256};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::{
    constants::{BACKEND_ERROR_BODY_LIMIT, BACKEND_LOG_BODY_LIMIT},
    error::{AppError, Result},
    models::{
        ClickRequest, ClickResponse, ClickResult, FinishRequest, FinishResponse,
        SessionStatusResponse, StartSessionRequest, StartSessionResponse,
    },
};

/// The remote session store that owns board truth for gated play.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn start_game(
        &self,
        ticket_id: U256,
        player: Address,
        prize_snapshot: U256,
    ) -> Result<StartSessionResponse>;

    async fn click(&self, ticket_id: U256, row: usize, col: usize) -> Result<ClickResponse>;

    async fn finish(&self, ticket_id: U256) -> Result<FinishResponse>;

    async fn status(&self, ticket_id: U256) -> Result<SessionStatusResponse>;
}

#[derive(Clone, Debug)]
pub struct HttpSessionBackend {
    base_url: String,
    client: Client,
}

impl HttpSessionBackend {
    /// Constructs a new instance via `new`.
    ///
    /// # Arguments
    /// * `base_url` - Root of the session backend, without the `/api` suffix.
    ///
    /// # Notes
    /// * No request timeout is set; every call is a single attempt.
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    // Internal helper that posts JSON and returns status plus raw body text.
    async fn post_json<B: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, String)> {
        let response = self
            .client
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;
        Ok((status, text))
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    /// Starts (or resumes) the backend session keyed by `ticket_id`.
    ///
    /// # Returns
    /// * `Ok(StartSessionResponse)` with the row layout sizes, never cell contents.
    /// * `Err(AppError::Backend)` on network failure, non-JSON body or non-2xx status.
    async fn start_game(
        &self,
        ticket_id: U256,
        player: Address,
        prize_snapshot: U256,
    ) -> Result<StartSessionResponse> {
        let request = StartSessionRequest {
            ticket_id: ticket_id.to_string(),
            player: ethers::utils::to_checksum(&player, None),
            prize_snapshot: prize_snapshot.to_string(),
        };
        tracing::debug!(
            "[backend start] ticket={} prize_snapshot={}",
            request.ticket_id,
            request.prize_snapshot
        );
        let (status, body) = self.post_json("/api/start", &request).await?;
        parse_backend_body("start", status, &body, "Failed to start game")
    }

    /// Sends one reveal for server-side judgement.
    ///
    /// # Returns
    /// * `Ok(ClickResponse)` for hits, and for misses or bot detection even when
    ///   the backend answers them with an error status.
    /// * `Err(AppError::Backend)` for any other failure.
    async fn click(&self, ticket_id: U256, row: usize, col: usize) -> Result<ClickResponse> {
        let request = ClickRequest {
            ticket_id: ticket_id.to_string(),
            row,
            col,
        };
        tracing::debug!("[backend click] ticket={} row={} col={}", ticket_id, row, col);
        let (status, body) = self.post_json("/api/click", &request).await?;
        interpret_click(status, &body)
    }

    async fn finish(&self, ticket_id: U256) -> Result<FinishResponse> {
        let request = FinishRequest {
            ticket_id: ticket_id.to_string(),
        };
        tracing::debug!("[backend finish] ticket={}", ticket_id);
        let (status, body) = self.post_json("/api/finish", &request).await?;
        parse_backend_body("finish", status, &body, "Failed to finish game")
    }

    async fn status(&self, ticket_id: U256) -> Result<SessionStatusResponse> {
        tracing::debug!("[backend status] ticket={}", ticket_id);
        let response = self
            .client
            .get(self.endpoint(&format!("/api/status?ticketId={}", ticket_id)))
            .send()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Backend(e.to_string()))?;
        parse_backend_body("status", status, &body, "Failed to get status")
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn error_field(value: &serde_json::Value) -> Option<String> {
    value
        .get("error")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

// Internal helper that parses a JSON body and applies the non-2xx rule.
fn parse_backend_body<T: DeserializeOwned>(
    label: &str,
    status: StatusCode,
    body: &str,
    fallback_error: &str,
) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|_| {
        tracing::debug!(
            "[backend {}] response not JSON {} {}",
            label,
            status,
            truncate(body, BACKEND_LOG_BODY_LIMIT)
        );
        AppError::Backend(format!("{} failed: {}", capitalize(label), status.as_u16()))
    })?;
    tracing::debug!("[backend {}] response {}", label, status);

    if !status.is_success() {
        return Err(AppError::Backend(
            error_field(&value).unwrap_or_else(|| fallback_error.to_string()),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| AppError::Backend(format!("Unexpected {} response: {}", label, e)))
}

/// Misses and bot detections are game outcomes even under an error status.
pub fn interpret_click(status: StatusCode, body: &str) -> Result<ClickResponse> {
    let value: serde_json::Value = serde_json::from_str(body).map_err(|_| {
        tracing::debug!(
            "[backend click] response not JSON {} {}",
            status,
            truncate(body, BACKEND_LOG_BODY_LIMIT)
        );
        AppError::Backend(format!(
            "Click failed: {} {}",
            status.as_u16(),
            truncate(body, BACKEND_ERROR_BODY_LIMIT)
        ))
    })?;
    tracing::debug!("[backend click] response {}", status);

    let result = value
        .get("result")
        .cloned()
        .and_then(|raw| serde_json::from_value::<ClickResult>(raw).ok());
    let is_outcome = matches!(result, Some(ClickResult::Miss | ClickResult::BotDetected));
    if !status.is_success() && !is_outcome {
        return Err(AppError::Backend(
            error_field(&value).unwrap_or_else(|| "Failed to process click".to_string()),
        ));
    }

    serde_json::from_value(value)
        .map_err(|e| AppError::Backend(format!("Unexpected click response: {}", e)))
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
