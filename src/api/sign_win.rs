use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{AppError, Result},
    services::win_signer::{missing_fields, WinSignature},
};

use super::AppState;

/// Body of `POST /api/sign-win`. Fields are optional here so that an absent
/// field is answered with the same 400 as an empty one.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignWinRequest {
    #[serde(default)]
    pub player: Option<Value>,
    #[serde(default)]
    pub ticket_id: Option<Value>,
    #[serde(default)]
    pub prize_snapshot: Option<Value>,
}

// Strings pass through untouched. JSON numbers are only exact up to u64;
// anything else would render as a float and never match on-chain values.
fn field_text(name: &str, value: Option<&Value>) -> Result<Option<String>> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(Some(text.clone())),
        Some(Value::Number(number)) => number.as_u64().map(|n| Some(n.to_string())).ok_or_else(|| {
            AppError::BadRequest(format!(
                "{} must be sent as a decimal string when it is not a u64 integer",
                name
            ))
        }),
        _ => Ok(None),
    }
}

/// POST /api/sign-win
pub async fn sign_win(
    State(state): State<AppState>,
    Json(req): Json<SignWinRequest>,
) -> Result<Json<WinSignature>> {
    let player = field_text("player", req.player.as_ref())?;
    let ticket_id = field_text("ticketId", req.ticket_id.as_ref())?;
    let prize_snapshot = field_text("prizeSnapshot", req.prize_snapshot.as_ref())?;
    let (Some(player), Some(ticket_id), Some(prize_snapshot)) = (player, ticket_id, prize_snapshot)
    else {
        return Err(missing_fields());
    };

    tracing::debug!(
        "sign-win request: player={} ticket={} prize_snapshot={}",
        player,
        ticket_id,
        prize_snapshot
    );
    let signed = state
        .signer
        .issue(&player, &ticket_id, &prize_snapshot)
        .await?;
    Ok(Json(signed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::models::TicketRecord;
    use crate::services::WinSigner;
    use crate::test_support::{signer_key, MockChain, REQUIRED_CHAIN};
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use ethers::types::{Address, U256};
    use serde_json::json;
    use std::sync::Arc;

    fn state_with(chain: Arc<MockChain>, with_key: bool) -> AppState {
        let key = with_key.then(signer_key);
        AppState {
            config: test_config(),
            signer: Arc::new(WinSigner::new(chain, key, REQUIRED_CHAIN)),
        }
    }

    fn chain_with_ticket() -> Arc<MockChain> {
        let chain = Arc::new(MockChain::new());
        chain.set_prize_pool(1_000_000);
        chain.insert_ticket(
            7,
            TicketRecord {
                owner: chain.player(),
                prize_snapshot: U256::from(500_000u64),
                claimed: false,
            },
        );
        chain
    }

    fn request(body: Value) -> Json<SignWinRequest> {
        Json(serde_json::from_value(body).unwrap())
    }

    async fn status_of(state: AppState, body: Value) -> StatusCode {
        match sign_win(State(state), request(body)).await {
            Ok(response) => response.into_response().status(),
            Err(err) => err.into_response().status(),
        }
    }

    #[tokio::test]
    async fn owner_gets_a_signature() {
        let chain = chain_with_ticket();
        let player = format!("{:?}", chain.player());
        let Json(signed) = sign_win(
            State(state_with(chain, true)),
            request(json!({"player": player, "ticketId": 7, "prizeSnapshot": "500000"})),
        )
        .await
        .unwrap();

        assert!(signed.success);
        assert_eq!(signed.signature.len(), 2 + 130);
        let rendered = serde_json::to_value(&signed).unwrap();
        assert!(rendered.get("expiresAt").is_some());
    }

    #[tokio::test]
    async fn other_player_gets_403_and_no_signature() {
        let chain = chain_with_ticket();
        let intruder = format!("{:?}", Address::from_low_u64_be(0xb0b));
        let status = status_of(
            state_with(chain, true),
            json!({"player": intruder, "ticketId": "7", "prizeSnapshot": "500000"}),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn missing_fields_are_400() {
        let chain = chain_with_ticket();
        let status = status_of(
            state_with(chain, true),
            json!({"ticketId": "7", "prizeSnapshot": "500000"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn snapshot_mismatch_is_400() {
        let chain = chain_with_ticket();
        let player = format!("{:?}", chain.player());
        let status = status_of(
            state_with(chain, true),
            json!({"player": player, "ticketId": "7", "prizeSnapshot": "499999"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unconfigured_signer_is_500() {
        let chain = chain_with_ticket();
        let player = format!("{:?}", chain.player());
        let status = status_of(
            state_with(chain, false),
            json!({"player": player, "ticketId": "7", "prizeSnapshot": "500000"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn numbers_and_strings_are_both_accepted() {
        assert_eq!(field_text("ticketId", Some(&json!(7))).unwrap(), Some("7".to_string()));
        assert_eq!(field_text("ticketId", Some(&json!("7"))).unwrap(), Some("7".to_string()));
        assert_eq!(field_text("ticketId", Some(&json!(""))).unwrap(), None);
        assert_eq!(field_text("ticketId", Some(&json!(null))).unwrap(), None);
        assert_eq!(field_text("ticketId", None).unwrap(), None);
    }

    #[test]
    fn inexact_numbers_are_rejected() {
        // 20 ETH in wei overflows u64 and would otherwise render as 2e19.
        let above_u64 = serde_json::from_str::<Value>("20000000000000000000").unwrap();
        match field_text("prizeSnapshot", Some(&above_u64)) {
            Err(AppError::BadRequest(msg)) => assert!(msg.starts_with("prizeSnapshot")),
            other => panic!("expected a field error, got {other:?}"),
        }
        assert!(field_text("ticketId", Some(&json!(-1))).is_err());
        assert!(field_text("ticketId", Some(&json!(1.5))).is_err());
    }

    #[tokio::test]
    async fn prize_above_u64_needs_a_string() {
        let chain = Arc::new(MockChain::new());
        let snapshot = U256::from_dec_str("20000000000000000000").unwrap();
        chain.set_prize_pool_wei(snapshot);
        chain.insert_ticket(
            7,
            TicketRecord {
                owner: chain.player(),
                prize_snapshot: snapshot,
                claimed: false,
            },
        );
        let player = format!("{:?}", chain.player());

        let as_number = serde_json::from_str::<Value>(&format!(
            r#"{{"player":"{}","ticketId":7,"prizeSnapshot":20000000000000000000}}"#,
            player
        ))
        .unwrap();
        assert_eq!(
            status_of(state_with(chain.clone(), true), as_number).await,
            StatusCode::BAD_REQUEST
        );

        let Json(signed) = sign_win(
            State(state_with(chain, true)),
            request(json!({
                "player": player,
                "ticketId": 7,
                "prizeSnapshot": "20000000000000000000"
            })),
        )
        .await
        .unwrap();
        assert!(signed.success);
    }
}
