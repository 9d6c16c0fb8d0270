//! Boundary validation for webhook payloads.
//!
//! Handlers deserialize into the loose `*Payload` types and convert them
//! into the validated forms here before any service sees them.

use serde::Deserialize;
use std::fmt;

use crate::domain::TransactionStatus;

pub const ASSET_CODE_MAX_LEN: usize = 12;
pub const TX_CODE_MAX_LEN: usize = 255;
pub const RECIPIENT_MAX_LEN: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_asset_code(asset_code: &str) -> ValidationResult {
    validate_required("code", asset_code)?;
    validate_max_len("code", asset_code, ASSET_CODE_MAX_LEN)?;

    if !asset_code.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return Err(ValidationError::new("code", "must be alphanumeric"));
    }

    Ok(())
}

/// Minor-unit amounts arrive either as JSON numbers or numeric strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Number(i64),
    Text(String),
}

impl AmountField {
    pub fn to_minor_units(&self) -> Result<i64, ValidationError> {
        let amount = match self {
            AmountField::Number(n) => *n,
            AmountField::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| ValidationError::new("amount", "must be an integer in minor units"))?,
        };
        if amount <= 0 {
            return Err(ValidationError::new("amount", "must be greater than zero"));
        }
        Ok(amount)
    }
}

#[derive(Debug, Deserialize)]
pub struct SendPayload {
    pub tx_code: String,
    pub to_user: Option<String>,
    pub counterparty: Option<String>,
    pub amount: AmountField,
    pub currency: String,
    pub issuer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub tx_code: String,
    pub recipient: String,
    pub amount: i64,
    pub currency: String,
    pub issuer: Option<String>,
}

impl TryFrom<SendPayload> for SendRequest {
    type Error = ValidationError;

    fn try_from(payload: SendPayload) -> Result<Self, Self::Error> {
        let tx_code = sanitize_string(&payload.tx_code);
        validate_required("tx_code", &tx_code)?;
        validate_max_len("tx_code", &tx_code, TX_CODE_MAX_LEN)?;

        let recipient = payload
            .to_user
            .or(payload.counterparty)
            .map(|r| r.trim().to_string())
            .unwrap_or_default();
        validate_required("to_user", &recipient)?;
        validate_max_len("to_user", &recipient, RECIPIENT_MAX_LEN)?;

        let currency = payload.currency.trim().to_string();
        validate_asset_code(&currency).map_err(|e| ValidationError::new("currency", e.message))?;

        let issuer = payload
            .issuer
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty());

        Ok(SendRequest {
            tx_code,
            recipient,
            amount: payload.amount.to_minor_units()?,
            currency,
            issuer,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UserAccountPayload {
    pub user_id: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl UserAccountPayload {
    pub fn user_id(&self) -> Result<String, ValidationError> {
        let user_id = sanitize_string(&self.user_id);
        validate_required("user_id", &user_id)?;
        Ok(user_id)
    }

    /// The federation name for the user: `metadata.username`, else the user id.
    pub fn username(&self) -> Result<String, ValidationError> {
        let username = self
            .metadata
            .as_ref()
            .and_then(|m| m.get("username"))
            .and_then(|u| u.as_str())
            .map(sanitize_string)
            .filter(|u| !u.is_empty());

        let username = match username {
            Some(u) => u,
            None => self.user_id()?,
        };
        if username.contains('*') || username.contains(' ') {
            return Err(ValidationError::new("username", "must not contain '*' or spaces"));
        }
        Ok(username)
    }
}

#[derive(Debug, Deserialize)]
pub struct AddAssetPayload {
    pub code: String,
    pub issuer: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl AddAssetPayload {
    pub fn validate(&self) -> ValidationResult {
        validate_asset_code(self.code.trim())?;
        validate_required("issuer", &self.issuer)?;
        Ok(())
    }
}

pub fn parse_status(value: &str) -> Result<TransactionStatus, ValidationError> {
    value
        .parse()
        .map_err(|e: String| ValidationError::new("status", e))
}
