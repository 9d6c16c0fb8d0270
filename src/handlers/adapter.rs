//! Webhook endpoints the accounting platform calls.

use axum::{
    Json,
    extract::{rejection::JsonRejection, State},
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::domain::amount::{parse_amount, to_cents, STELLAR_DIVISIBILITY};
use crate::domain::{deposit_account_id, OutgoingTransaction, TransactionStatus, WatchedAccount};
use crate::error::{AppError, BridgeError};
use crate::services::Job;
use crate::validation::{AddAssetPayload, SendPayload, SendRequest, UserAccountPayload};
use crate::AppState;

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

fn success() -> Json<Value> {
    Json(json!({ "status": "success" }))
}

/// Stores the send and hands it to the workers. A repeated webhook for the
/// same `tx_code` is enqueued again only while no worker has claimed it;
/// the claim keeps it from executing twice.
pub async fn send(
    State(state): State<AppState>,
    body: Result<Json<SendPayload>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let request = SendRequest::try_from(payload(body)?).map_err(|e| AppError::Validation(e.to_string()))?;

    let tx = OutgoingTransaction::new(
        request.tx_code,
        request.recipient,
        request.amount,
        request.currency,
        request.issuer,
    );
    let (stored, created) = state.storage.outgoing.insert_if_absent(&tx).await?;

    if created {
        tracing::info!(tx_code = %stored.tx_code, currency = %stored.currency, amount = stored.amount, "Send accepted");
    } else if stored.status == TransactionStatus::Pending && !stored.claimed {
        tracing::info!(tx_code = %stored.tx_code, "Duplicate send webhook, still unclaimed, re-enqueueing");
    } else {
        tracing::info!(tx_code = %stored.tx_code, status = %stored.status, "Duplicate send webhook ignored");
        return Ok(success());
    }

    state
        .jobs
        .enqueue(Job::Send {
            tx_code: stored.tx_code.clone(),
        })
        .await?;

    Ok(success())
}

#[derive(Debug, Serialize)]
pub struct UserAccountResponse {
    pub account_id: String,
    pub user_id: String,
}

pub async fn user_account(
    State(state): State<AppState>,
    body: Result<Json<UserAccountPayload>, JsonRejection>,
) -> Result<Json<UserAccountResponse>, AppError> {
    let body = payload(body)?;
    let user_id = body.user_id().map_err(|e| AppError::Validation(e.to_string()))?;
    let username = body.username().map_err(|e| AppError::Validation(e.to_string()))?;

    let account_id = deposit_account_id(&username, &state.wallet_domain);
    let entry = state.storage.users.get_or_create(&user_id, &account_id).await?;

    Ok(Json(UserAccountResponse {
        account_id: entry.account_id,
        user_id: entry.user_id,
    }))
}

pub async fn add_asset(
    State(state): State<AppState>,
    body: Result<Json<AddAssetPayload>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let body = payload(body)?;
    body.validate().map_err(|e| AppError::Validation(e.to_string()))?;

    let metadata = body.metadata.unwrap_or_else(|| json!({}));
    let registration = state
        .registrar
        .add_asset(body.code.trim(), body.issuer.trim(), metadata)
        .await?;

    Ok(Json(json!({
        "status": "success",
        "issuer": registration.asset.issuer,
    })))
}

async fn default_account(state: &AppState) -> Result<WatchedAccount, AppError> {
    state
        .storage
        .accounts
        .get_default(&state.network)
        .await?
        .ok_or_else(|| BridgeError::NoDefaultAccount(state.network.clone()).into())
}

/// Native balance of the operating account, in minor units.
pub async fn operating_balance(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let account = default_account(&state).await?;
    let details = state
        .ledger
        .get_account(&account.account_id)
        .await
        .map_err(BridgeError::from)?;

    let balance = match details.native_balance() {
        Some(raw) => {
            let amount = parse_amount(raw).map_err(BridgeError::from)?;
            to_cents(&amount, STELLAR_DIVISIBILITY).map_err(BridgeError::from)?
        }
        None => 0,
    };

    Ok(Json(json!({ "balance": balance })))
}

pub async fn operating_account(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let account = default_account(&state).await?;
    Ok(Json(json!({
        "account_id": account.account_id,
        "network": account.network,
        "name": account.name,
    })))
}

/// Purchase, withdraw and deposit webhooks need no ledger action.
pub async fn acknowledge(body: Result<Json<Value>, JsonRejection>) -> Result<Json<Value>, AppError> {
    let body = payload(body)?;
    tracing::debug!(tx_code = ?body.get("tx_code"), "Webhook acknowledged");
    Ok(success())
}
