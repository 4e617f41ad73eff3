//! Read-repair for initiations the ledger failed to record.
//!
//! When the provider accepted a checkout but the ledger write failed, the
//! records are parked here. The scheduler replays them on every tick until
//! the ledger takes them, after which normal reconciliation applies.
//!
//! # Durability
//! With a snapshot path the journal is rewritten on every change and
//! reloaded at startup, so parked initiations survive a restart.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ledger::{Donation, GatewayTransaction, LedgerStore, StoreError, StoreResult};
use crate::observability::metrics;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanedInitiation {
    pub donation: Donation,
    pub transaction: GatewayTransaction,
    pub recorded_at: DateTime<Utc>,
}

/// Orphaned initiations keyed by reference.
#[derive(Debug, Default)]
pub struct RecoveryJournal {
    orphans: DashMap<String, OrphanedInitiation>,
    persistence_path: Option<PathBuf>,
}

impl RecoveryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load parked initiations from `path` if it exists, and keep writing to it.
    pub async fn load_from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let orphans = DashMap::new();

        if tokio::fs::try_exists(&path).await? {
            let bytes = tokio::fs::read(&path).await?;
            let parked: Vec<OrphanedInitiation> = serde_json::from_slice(&bytes)?;
            for orphan in parked {
                orphans.insert(orphan.transaction.reference.clone(), orphan);
            }
            if !orphans.is_empty() {
                tracing::warn!(
                    path = %path.display(),
                    orphans = orphans.len(),
                    "Loaded unrecorded initiations from recovery journal"
                );
            }
        }

        Ok(Self {
            orphans,
            persistence_path: Some(path),
        })
    }

    /// Park an initiation the ledger did not take.
    pub async fn record(&self, donation: Donation, transaction: GatewayTransaction) {
        let reference = transaction.reference.clone();
        tracing::error!(
            reference = %reference,
            donation_id = %donation.id,
            amount_minor = donation.amount_minor,
            "Parked unrecorded initiation in recovery journal"
        );
        metrics::record_orphan("parked");
        self.orphans.insert(
            reference,
            OrphanedInitiation {
                donation,
                transaction,
                recorded_at: Utc::now(),
            },
        );
        self.persist().await;
    }

    pub fn len(&self) -> usize {
        self.orphans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orphans.is_empty()
    }

    pub fn references(&self) -> Vec<String> {
        self.orphans.iter().map(|r| r.key().clone()).collect()
    }

    /// Try to persist every parked initiation. Returns how many were recovered.
    ///
    /// An orphan leaves the journal only once the ledger holds a transaction
    /// for the same donation under its reference.
    pub async fn replay(&self, ledger: &dyn LedgerStore) -> usize {
        let parked: Vec<OrphanedInitiation> =
            self.orphans.iter().map(|r| r.value().clone()).collect();
        let mut recovered = 0;
        let mut changed = false;

        for orphan in parked {
            let reference = orphan.transaction.reference.clone();
            let donation_id = orphan.donation.id;
            match ledger.create_pair(orphan.donation, orphan.transaction).await {
                Ok(()) => {
                    tracing::info!(reference = %reference, "Recovered orphaned initiation");
                    metrics::record_orphan("recovered");
                    self.orphans.remove(&reference);
                    changed = true;
                    recovered += 1;
                }
                Err(StoreError::DuplicateReference(_)) => {
                    match ledger.find_by_reference(&reference).await {
                        Ok(Some((stored, _))) if stored.donation_id == donation_id => {
                            tracing::info!(reference = %reference, "Orphaned initiation already recorded");
                            self.orphans.remove(&reference);
                            changed = true;
                        }
                        Ok(_) => {
                            tracing::error!(
                                reference = %reference,
                                donation_id = %donation_id,
                                "Orphaned initiation collides with another donation's reference; needs manual recovery"
                            );
                            metrics::record_orphan("conflict");
                        }
                        Err(e) => {
                            tracing::warn!(reference = %reference, error = %e, "Could not check orphaned initiation");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(reference = %reference, error = %e, "Orphaned initiation still unrecorded");
                }
            }
        }

        if changed {
            self.persist().await;
        }
        recovered
    }

    async fn persist(&self) {
        let Some(path) = &self.persistence_path else {
            return;
        };
        if let Err(e) = self.write_snapshot(path).await {
            tracing::error!(path = %path.display(), error = %e, "Failed to write recovery journal");
        }
    }

    async fn write_snapshot(&self, path: &Path) -> StoreResult<()> {
        let parked: Vec<OrphanedInitiation> =
            self.orphans.iter().map(|r| r.value().clone()).collect();
        let bytes = serde_json::to_vec_pretty(&parked)?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
