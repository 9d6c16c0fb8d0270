//! Cursor-driven ingestion of a watched account's payment history.

use std::sync::Arc;

use crate::domain::WatchedAccount;
use crate::error::BridgeError;
use crate::ports::CursorStore;
use crate::stellar::{Ledger, PaymentRecord};
use crate::utils::locks::KeyedLocks;

/// Payments sent to `account_id` by someone else, in page order.
pub fn incoming_only(account_id: &str, records: Vec<PaymentRecord>) -> Vec<PaymentRecord> {
    records
        .into_iter()
        .filter(|r| r.to == account_id && r.from != account_id)
        .collect()
}

#[derive(Clone)]
pub struct IngestionPoller {
    ledger: Arc<dyn Ledger>,
    cursors: Arc<dyn CursorStore>,
    page_size: u32,
    locks: KeyedLocks,
}

impl IngestionPoller {
    pub fn new(ledger: Arc<dyn Ledger>, cursors: Arc<dyn CursorStore>, page_size: u32) -> Self {
        Self {
            ledger,
            cursors,
            page_size,
            locks: KeyedLocks::new(),
        }
    }

    pub fn locks(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Fetches the next page after the stored cursor and returns its
    /// incoming payments. The cursor moves to the end of the page,
    /// including records that were filtered out.
    pub async fn poll(&self, account: &WatchedAccount) -> Result<Vec<PaymentRecord>, BridgeError> {
        let _guard = self.locks.lock(&account.account_id).await;
        self.poll_locked(account).await
    }

    /// As [`poll`](Self::poll), but returns `None` instead of waiting when
    /// another poll of the same account is in flight.
    pub async fn try_poll(
        &self,
        account: &WatchedAccount,
    ) -> Result<Option<Vec<PaymentRecord>>, BridgeError> {
        match self.locks.try_lock(&account.account_id) {
            Some(_guard) => self.poll_locked(account).await.map(Some),
            None => Ok(None),
        }
    }

    async fn poll_locked(&self, account: &WatchedAccount) -> Result<Vec<PaymentRecord>, BridgeError> {
        let account_id = account.account_id.as_str();
        let cursor = self.cursors.get_cursor(account_id).await?;

        let page = self
            .ledger
            .get_payments(account_id, cursor.as_deref(), self.page_size)
            .await?;

        let Some(last_token) = page.last_paging_token else {
            return Ok(Vec::new());
        };

        let fetched = page.records.len();
        let incoming = incoming_only(account_id, page.records);

        let advanced = self
            .cursors
            .advance_cursor(account_id, cursor.as_deref(), &last_token)
            .await?;
        if !advanced {
            tracing::warn!(account_id = %account_id, "Cursor moved during poll, discarding page");
            return Err(BridgeError::CursorConflict(account_id.to_string()));
        }

        tracing::debug!(
            account_id = %account_id,
            fetched,
            incoming = incoming.len(),
            cursor = %last_token,
            "Polled payments"
        );

        Ok(incoming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stellar::{PaymentAsset, PaymentKind};
    use bigdecimal::BigDecimal;
    use proptest::prelude::*;

    fn record(token: &str, from: &str, to: &str) -> PaymentRecord {
        PaymentRecord {
            kind: PaymentKind::Payment,
            id: token.to_string(),
            paging_token: token.to_string(),
            hash: format!("hash-{}", token),
            from: from.to_string(),
            to: to.to_string(),
            amount: BigDecimal::from(1),
            asset: PaymentAsset::Native,
            detail_link: String::new(),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_incoming_only_drops_sends_and_self_payments() {
        let records = vec![
            record("1", "GOTHER", "GME"),
            record("2", "GME", "GOTHER"),
            record("3", "GME", "GME"),
            record("4", "GTHIRD", "GME"),
        ];

        let kept: Vec<String> = incoming_only("GME", records)
            .into_iter()
            .map(|r| r.paging_token)
            .collect();
        assert_eq!(kept, vec!["1", "4"]);
    }

    proptest! {
        #[test]
        fn incoming_only_keeps_exactly_the_incoming_records(
            directions in proptest::collection::vec(0u8..3, 0..50)
        ) {
            let records: Vec<PaymentRecord> = directions
                .iter()
                .enumerate()
                .map(|(i, d)| match d {
                    0 => record(&i.to_string(), "GOTHER", "GME"),
                    1 => record(&i.to_string(), "GME", "GOTHER"),
                    _ => record(&i.to_string(), "GME", "GME"),
                })
                .collect();

            let expected: Vec<String> = directions
                .iter()
                .enumerate()
                .filter(|(_, d)| **d == 0)
                .map(|(i, _)| i.to_string())
                .collect();

            let kept: Vec<String> = incoming_only("GME", records)
                .into_iter()
                .map(|r| r.paging_token)
                .collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
