//! Ledger storage port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ledger::types::{
    Donation, GatewayTransaction, StoreResult, TransactionStatus, Transition,
};

/// Durable home of donations and their gateway transactions.
///
/// Implementations define the linearization point for status transitions:
/// `settle` must compare and swap atomically across both records, even when
/// several processes share the same backing store.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist a donation and its transaction together, or neither.
    ///
    /// Fails with `DuplicateReference` if the reference is already taken.
    async fn create_pair(
        &self,
        donation: Donation,
        transaction: GatewayTransaction,
    ) -> StoreResult<()>;

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> StoreResult<Option<(GatewayTransaction, Donation)>>;

    async fn get_donation(&self, id: Uuid) -> StoreResult<Option<Donation>>;

    /// Move a transaction from `expected` to `new_status` and its donation to
    /// the matching state, counting one verification attempt.
    ///
    /// Returns `Transition::Lost` without writing anything when the stored
    /// status is no longer `expected`.
    async fn settle(
        &self,
        transaction_id: Uuid,
        expected: TransactionStatus,
        new_status: TransactionStatus,
        provider_status: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<Transition>;

    /// Count a verification attempt that did not settle the transaction.
    async fn record_attempt(
        &self,
        transaction_id: Uuid,
        provider_status: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<GatewayTransaction>;

    /// Stamp the time the donor's redirect callback arrived.
    async fn record_callback(
        &self,
        reference: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<GatewayTransaction>;

    /// Unflagged pending transactions created before `older_than` with fewer
    /// than `attempts_below` attempts, oldest first.
    async fn list_pending(
        &self,
        older_than: DateTime<Utc>,
        attempts_below: u32,
    ) -> StoreResult<Vec<GatewayTransaction>>;

    /// Unflagged pending transactions that reached the attempt ceiling.
    async fn list_exhausted(&self, attempts_at_least: u32) -> StoreResult<Vec<GatewayTransaction>>;

    /// Mark a transaction for manual review. Returns false if already flagged.
    async fn flag_for_review(
        &self,
        transaction_id: Uuid,
        reason: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn list_flagged(&self) -> StoreResult<Vec<GatewayTransaction>>;
}
