//! In-process ledger with optional JSON snapshot persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::ledger::store::LedgerStore;
use crate::ledger::types::{
    Donation, GatewayTransaction, ReviewFlag, StoreError, StoreResult, TransactionStatus,
    Transition,
};

#[derive(Default)]
struct LedgerState {
    donations: HashMap<Uuid, Donation>,
    transactions: HashMap<Uuid, GatewayTransaction>,
    by_reference: HashMap<String, Uuid>,
}

impl LedgerState {
    fn transaction(&self, id: Uuid) -> StoreResult<&GatewayTransaction> {
        self.transactions
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    donations: Vec<&'a Donation>,
    transactions: Vec<&'a GatewayTransaction>,
}

#[derive(Deserialize)]
struct Snapshot {
    donations: Vec<Donation>,
    transactions: Vec<GatewayTransaction>,
}

/// A ledger held behind a single `RwLock`.
///
/// Every mutation takes the write lock, so check-and-set across a donation
/// and its transaction is atomic within the process. When a persistence path
/// is set, the full snapshot is rewritten (temp file + rename) before the
/// write lock is released; a failed write rolls the in-memory change back.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
    persistence_path: Option<PathBuf>,
}

impl InMemoryLedger {
    /// Create a new, empty, memory-only ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a snapshot file if it exists, and keep writing to it.
    pub async fn load_from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = LedgerState::default();

        if tokio::fs::try_exists(&path).await? {
            let bytes = tokio::fs::read(&path).await?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            for tx in snapshot.transactions {
                state.by_reference.insert(tx.reference.clone(), tx.id);
                state.transactions.insert(tx.id, tx);
            }
            for donation in snapshot.donations {
                state.donations.insert(donation.id, donation);
            }
            tracing::info!(
                path = %path.display(),
                transactions = state.transactions.len(),
                "Loaded ledger snapshot"
            );
        }

        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            persistence_path: Some(path),
        })
    }

    /// Number of transactions held.
    pub async fn len(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn persist(&self, state: &LedgerState) -> StoreResult<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        let snapshot = SnapshotRef {
            donations: state.donations.values().collect(),
            transactions: state.transactions.values().collect(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Swap in an updated transaction, restoring the old one if persisting fails.
    async fn replace_transaction(
        &self,
        state: &mut LedgerState,
        updated: GatewayTransaction,
    ) -> StoreResult<GatewayTransaction> {
        let previous = state.transactions.insert(updated.id, updated.clone());
        if let Err(e) = self.persist(state).await {
            if let Some(previous) = previous {
                state.transactions.insert(previous.id, previous);
            }
            return Err(e);
        }
        Ok(updated)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn create_pair(
        &self,
        donation: Donation,
        transaction: GatewayTransaction,
    ) -> StoreResult<()> {
        let mut state = self.state.write().await;
        if state.by_reference.contains_key(&transaction.reference) {
            return Err(StoreError::DuplicateReference(transaction.reference));
        }

        let donation_id = donation.id;
        let tx_id = transaction.id;
        let reference = transaction.reference.clone();

        state.donations.insert(donation_id, donation);
        state.transactions.insert(tx_id, transaction);
        state.by_reference.insert(reference.clone(), tx_id);

        if let Err(e) = self.persist(&state).await {
            state.donations.remove(&donation_id);
            state.transactions.remove(&tx_id);
            state.by_reference.remove(&reference);
            return Err(e);
        }
        Ok(())
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<(GatewayTransaction, Donation)>> {
        let state = self.state.read().await;
        let Some(tx_id) = state.by_reference.get(reference) else {
            return Ok(None);
        };
        let tx = state.transaction(*tx_id)?;
        let donation = state
            .donations
            .get(&tx.donation_id)
            .ok_or_else(|| StoreError::NotFound(tx.donation_id.to_string()))?;
        Ok(Some((tx.clone(), donation.clone())))
    }

    async fn get_donation(&self, id: Uuid) -> StoreResult<Option<Donation>> {
        Ok(self.state.read().await.donations.get(&id).cloned())
    }

    async fn settle(
        &self,
        transaction_id: Uuid,
        expected: TransactionStatus,
        new_status: TransactionStatus,
        provider_status: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Transition> {
        if !new_status.is_terminal() {
            return Err(StoreError::InvalidTransition(new_status));
        }

        let mut state = self.state.write().await;
        let current = state.transaction(transaction_id)?.clone();
        if current.status != expected {
            return Ok(Transition::Lost(current));
        }
        let donation_before = state
            .donations
            .get(&current.donation_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(current.donation_id.to_string()))?;

        let mut transaction = current.clone();
        transaction.status = new_status;
        transaction.provider_status = Some(provider_status.to_string());
        transaction.attempts = transaction.attempts.saturating_add(1);
        transaction.last_verified_at = Some(at);

        let mut donation = donation_before.clone();
        donation.status = new_status.donation_status();
        donation.updated_at = at;

        state.transactions.insert(transaction.id, transaction.clone());
        state.donations.insert(donation.id, donation.clone());

        if let Err(e) = self.persist(&state).await {
            state.transactions.insert(current.id, current);
            state.donations.insert(donation_before.id, donation_before);
            return Err(e);
        }

        Ok(Transition::Applied { transaction, donation })
    }

    async fn record_attempt(
        &self,
        transaction_id: Uuid,
        provider_status: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<GatewayTransaction> {
        let mut state = self.state.write().await;
        let mut tx = state.transaction(transaction_id)?.clone();
        tx.attempts = tx.attempts.saturating_add(1);
        tx.last_verified_at = Some(at);
        if let Some(status) = provider_status {
            tx.provider_status = Some(status.to_string());
        }
        self.replace_transaction(&mut state, tx).await
    }

    async fn record_callback(
        &self,
        reference: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<GatewayTransaction> {
        let mut state = self.state.write().await;
        let tx_id = *state
            .by_reference
            .get(reference)
            .ok_or_else(|| StoreError::NotFound(reference.to_string()))?;
        let mut tx = state.transaction(tx_id)?.clone();
        if tx.callback_received_at.is_some() {
            return Ok(tx);
        }
        tx.callback_received_at = Some(at);
        self.replace_transaction(&mut state, tx).await
    }

    async fn list_pending(
        &self,
        older_than: DateTime<Utc>,
        attempts_below: u32,
    ) -> StoreResult<Vec<GatewayTransaction>> {
        let state = self.state.read().await;
        let mut pending: Vec<GatewayTransaction> = state
            .transactions
            .values()
            .filter(|tx| {
                tx.status == TransactionStatus::Pending
                    && tx.review.is_none()
                    && tx.created_at < older_than
                    && tx.attempts < attempts_below
            })
            .cloned()
            .collect();
        pending.sort_by_key(|tx| tx.created_at);
        Ok(pending)
    }

    async fn list_exhausted(&self, attempts_at_least: u32) -> StoreResult<Vec<GatewayTransaction>> {
        let state = self.state.read().await;
        let mut exhausted: Vec<GatewayTransaction> = state
            .transactions
            .values()
            .filter(|tx| {
                tx.status == TransactionStatus::Pending
                    && tx.review.is_none()
                    && tx.attempts >= attempts_at_least
            })
            .cloned()
            .collect();
        exhausted.sort_by_key(|tx| tx.created_at);
        Ok(exhausted)
    }

    async fn flag_for_review(
        &self,
        transaction_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let mut tx = state.transaction(transaction_id)?.clone();
        if tx.review.is_some() {
            return Ok(false);
        }
        tx.review = Some(ReviewFlag {
            reason: reason.to_string(),
            flagged_at: at,
        });
        self.replace_transaction(&mut state, tx).await?;
        Ok(true)
    }

    async fn list_flagged(&self) -> StoreResult<Vec<GatewayTransaction>> {
        let state = self.state.read().await;
        let mut flagged: Vec<GatewayTransaction> = state
            .transactions
            .values()
            .filter(|tx| tx.review.is_some())
            .cloned()
            .collect();
        flagged.sort_by_key(|tx| tx.created_at);
        Ok(flagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{DonationStatus, Donor};

    fn pair(reference: &str, created_at: DateTime<Utc>) -> (Donation, GatewayTransaction) {
        let donation = Donation {
            id: Uuid::new_v4(),
            donor: Donor {
                name: Some("Ada".into()),
                email: "ada@example.org".into(),
                phone: None,
            },
            amount_minor: 5000,
            currency: "NGN".into(),
            status: DonationStatus::Pending,
            anonymous: false,
            visible: true,
            message: None,
            created_at,
            updated_at: created_at,
        };
        let tx = GatewayTransaction {
            id: Uuid::new_v4(),
            donation_id: donation.id,
            reference: reference.into(),
            access_code: None,
            status: TransactionStatus::Pending,
            provider_status: None,
            attempts: 0,
            last_verified_at: None,
            callback_received_at: None,
            review: None,
            created_at,
        };
        (donation, tx)
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let ledger = InMemoryLedger::new();
        let (d1, t1) = pair("REF-1", Utc::now());
        let (d2, t2) = pair("REF-1", Utc::now());

        ledger.create_pair(d1, t1).await.unwrap();
        let err = ledger.create_pair(d2.clone(), t2).await.unwrap_err();

        assert!(matches!(err, StoreError::DuplicateReference(r) if r == "REF-1"));
        assert_eq!(ledger.len().await, 1);
        assert!(ledger.get_donation(d2.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_settle_first_writer_wins() {
        let ledger = InMemoryLedger::new();
        let (d, t) = pair("REF-2", Utc::now());
        let tx_id = t.id;
        ledger.create_pair(d, t).await.unwrap();

        let first = ledger
            .settle(tx_id, TransactionStatus::Pending, TransactionStatus::Success, "success", Utc::now())
            .await
            .unwrap();
        let second = ledger
            .settle(tx_id, TransactionStatus::Pending, TransactionStatus::Failed, "failed", Utc::now())
            .await
            .unwrap();

        match first {
            Transition::Applied { transaction, donation } => {
                assert_eq!(transaction.status, TransactionStatus::Success);
                assert_eq!(transaction.attempts, 1);
                assert_eq!(donation.status, DonationStatus::Completed);
            }
            other => panic!("expected applied, got {:?}", other),
        }
        match second {
            Transition::Lost(current) => assert_eq!(current.status, TransactionStatus::Success),
            other => panic!("expected lost, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_settle_rejects_pending_target() {
        let ledger = InMemoryLedger::new();
        let (d, t) = pair("REF-3", Utc::now());
        let tx_id = t.id;
        ledger.create_pair(d, t).await.unwrap();

        let err = ledger
            .settle(tx_id, TransactionStatus::Pending, TransactionStatus::Pending, "ongoing", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition(TransactionStatus::Pending)));
    }

    #[tokio::test]
    async fn test_list_pending_filters() {
        let ledger = InMemoryLedger::new();
        let now = Utc::now();
        let old = now - chrono::Duration::minutes(30);

        let (d1, t1) = pair("OLD", old);
        let (d2, t2) = pair("FRESH", now);
        let (d3, t3) = pair("FLAGGED", old);
        let flagged_id = t3.id;
        ledger.create_pair(d1, t1).await.unwrap();
        ledger.create_pair(d2, t2).await.unwrap();
        ledger.create_pair(d3, t3).await.unwrap();
        assert!(ledger.flag_for_review(flagged_id, "manual", now).await.unwrap());
        assert!(!ledger.flag_for_review(flagged_id, "manual", now).await.unwrap());

        let pending = ledger
            .list_pending(now - chrono::Duration::minutes(10), 5)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reference, "OLD");

        assert_eq!(ledger.list_flagged().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let ledger = InMemoryLedger::load_from_file(&path).await.unwrap();
        let (d, t) = pair("PERSIST", Utc::now());
        let tx_id = t.id;
        ledger.create_pair(d, t).await.unwrap();
        ledger.record_attempt(tx_id, Some("ongoing"), Utc::now()).await.unwrap();

        let reloaded = InMemoryLedger::load_from_file(&path).await.unwrap();
        let (tx, donation) = reloaded.find_by_reference("PERSIST").await.unwrap().unwrap();
        assert_eq!(tx.attempts, 1);
        assert_eq!(tx.provider_status.as_deref(), Some("ongoing"));
        assert_eq!(donation.amount_minor, 5000);
    }

    #[tokio::test]
    async fn test_failed_persist_leaves_nothing_visible() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be replaced by rename, so every write fails.
        let path = dir.path().join("blocked");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();

        let ledger = InMemoryLedger {
            state: Arc::new(RwLock::new(LedgerState::default())),
            persistence_path: Some(path),
        };
        let (d, t) = pair("NOPE", Utc::now());
        assert!(ledger.create_pair(d, t).await.is_err());
        assert!(ledger.find_by_reference("NOPE").await.unwrap().is_none());
    }
}
