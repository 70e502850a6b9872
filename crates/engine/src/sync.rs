//! Offline reconciliation with a remote store.
//!
//! A cycle pushes every dirty local record, pulls the remote changes since
//! the last successful cycle and merges them by last-writer-wins on
//! `updated_at`. Any remote failure aborts the cycle before the merge: the
//! local state is untouched and the dirty records are pushed again next
//! time. Pushes are idempotent (update-or-create, delete tolerating a
//! missing record), so replaying them is safe.
//!
//! `updated_at` is a device clock and only decides conflicts. Where the pull
//! resumes from is the remote's own change stamp, reported as
//! [`Changes::cursor`], so an edit pushed late is still pulled by peers that
//! synced in between.

use std::{collections::HashMap, future::Future};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{Ledger, SyncStatus, Transaction};

/// Failure reported by a [`RemoteStore`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote store does not know the record.
    #[error("record not found on remote")]
    NotFound,
    #[error("network error: {0}")]
    Network(String),
    #[error("remote rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("a sync cycle is already running")]
    InFlight,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// A pulled batch and the remote change stamp to resume from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub records: Vec<Transaction>,
    /// Latest remote change stamp in `records`; `None` when the batch is
    /// empty.
    pub cursor: Option<DateTime<Utc>>,
}

/// The authoritative copy a replica synchronizes with.
///
/// Writes are whole-record and last-writer-wins: a pushed record whose
/// `updated_at` is older than the stored one is ignored, and the stored one
/// is reported again by the next pull.
pub trait RemoteStore {
    /// Replaces an existing record, `deleted` flag included. Unknown ids
    /// fail with [`RemoteError::NotFound`].
    fn update(&self, record: &Transaction) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Stores a record the remote has never seen, keeping its id.
    fn create(&self, record: &Transaction) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Stores `tombstone`, stamped with its own `updated_at`. Unknown ids
    /// fail with [`RemoteError::NotFound`].
    fn delete(&self, tombstone: &Transaction) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Records whose remote change stamp is at or after `since`, or every
    /// record when `None`. Deleted records are included so tombstones
    /// propagate.
    fn changes_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Changes, RemoteError>> + Send;
}

/// Lets several replicas share one store.
impl<R: RemoteStore + Sync> RemoteStore for &R {
    fn update(&self, record: &Transaction) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).update(record)
    }

    fn create(&self, record: &Transaction) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).create(record)
    }

    fn delete(&self, tombstone: &Transaction) -> impl Future<Output = Result<(), RemoteError>> + Send {
        (**self).delete(tombstone)
    }

    fn changes_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Changes, RemoteError>> + Send {
        (**self).changes_since(since)
    }
}

/// Counters of a completed cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Records pushed as updates.
    pub pushed: usize,
    /// Records the remote did not know and were created.
    pub created: usize,
    /// Tombstones pushed as deletes.
    pub deleted: usize,
    /// Records received from the pull.
    pub pulled: usize,
    /// Pulled records that replaced or added to the local collection.
    pub adopted: usize,
}

/// Runs sync cycles against a remote, one at a time.
#[derive(Debug)]
pub struct SyncReconciler<R> {
    remote: R,
    cycle: Mutex<()>,
}

impl<R: RemoteStore> SyncReconciler<R> {
    pub fn new(remote: R) -> Self {
        Self {
            remote,
            cycle: Mutex::new(()),
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Runs one push/pull/merge cycle over `ledger`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InFlight`] if another cycle of this reconciler is
    ///   running;
    /// - [`SyncError::Remote`] on the first push or pull failure. Nothing
    ///   local is modified in that case.
    pub async fn run(&self, ledger: &Ledger) -> Result<SyncReport, SyncError> {
        let Ok(_cycle) = self.cycle.try_lock() else {
            return Err(SyncError::InFlight);
        };

        let snapshot = ledger.snapshot().await;
        let mut report = SyncReport::default();

        for record in snapshot
            .transactions
            .iter()
            .filter(|tx| tx.sync_status == SyncStatus::Dirty)
        {
            if let Err(err) = self.push(record, &mut report).await {
                tracing::warn!(id = %record.id, "sync aborted during push: {err}");
                return Err(err.into());
            }
        }

        let changes = match self.remote.changes_since(snapshot.last_sync_at).await {
            Ok(changes) => changes,
            Err(err) => {
                tracing::warn!("sync aborted during pull: {err}");
                return Err(err.into());
            }
        };
        report.pulled = changes.records.len();
        report.adopted = ledger.absorb(&snapshot, changes).await;

        tracing::info!(
            pushed = report.pushed,
            created = report.created,
            deleted = report.deleted,
            pulled = report.pulled,
            adopted = report.adopted,
            "sync cycle completed"
        );
        Ok(report)
    }

    async fn push(&self, record: &Transaction, report: &mut SyncReport) -> Result<(), RemoteError> {
        if record.deleted {
            match self.remote.delete(record).await {
                Ok(()) | Err(RemoteError::NotFound) => report.deleted += 1,
                Err(err) => return Err(err),
            }
            return Ok(());
        }

        match self.remote.update(record).await {
            Ok(()) => report.pushed += 1,
            Err(RemoteError::NotFound) => {
                self.remote.create(record).await?;
                report.created += 1;
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }
}

/// Result of [`merge_remote`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Merge {
    pub records: Vec<Transaction>,
    /// How many remote records were taken over the local ones.
    pub adopted: usize,
}

/// Last-writer-wins merge of `remote` into `local`.
///
/// For an id known on both sides, the record with the strictly greater
/// `updated_at` wins; ties keep the local record. Remote-only records are
/// appended, local-only records are kept. Taken remote records are marked
/// synced; local records keep their status.
pub fn merge_remote(local: &[Transaction], remote: Vec<Transaction>) -> Merge {
    let mut records = local.to_vec();
    let mut index: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(i, tx)| (tx.id.clone(), i))
        .collect();

    let mut adopted = 0;
    for mut incoming in remote {
        incoming.sync_status = SyncStatus::Synced;
        match index.get(&incoming.id) {
            Some(&i) => {
                if incoming.updated_at > records[i].updated_at {
                    records[i] = incoming;
                    adopted += 1;
                }
            }
            None => {
                index.insert(incoming.id.clone(), records.len());
                records.push(incoming);
                adopted += 1;
            }
        }
    }

    Merge { records, adopted }
}

/// Merges `remote` into `current` and marks the result synced.
///
/// `pushed` is the snapshot the cycle pushed. A local record that changed
/// after that snapshot and survives the merge stays dirty, so the next cycle
/// pushes its current version.
pub(crate) fn reconcile(
    current: &[Transaction],
    pushed: &[Transaction],
    remote: Vec<Transaction>,
) -> (Vec<Transaction>, usize) {
    let pushed: HashMap<&str, DateTime<Utc>> = pushed
        .iter()
        .map(|tx| (tx.id.as_str(), tx.updated_at))
        .collect();

    let Merge {
        mut records,
        adopted,
    } = merge_remote(current, remote);
    for tx in &mut records {
        let changed_since_push = pushed.get(tx.id.as_str()) != Some(&tx.updated_at);
        if !(tx.sync_status == SyncStatus::Dirty && changed_since_push) {
            tx.sync_status = SyncStatus::Synced;
        }
    }
    (records, adopted)
}
