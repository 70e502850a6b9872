use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SyncStatus, Transaction};

/// The record collection a replica holds, and the remote change stamp its
/// next pull resumes from.
///
/// Serializes to the persisted local state shape
/// `{ "transactions": [...], "lastSyncAt": "..." | null }`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl State {
    #[must_use]
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions,
            last_sync_at: None,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    /// Non-deleted records, in insertion order.
    pub fn live(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_live())
    }

    /// Every record of a plan, deleted ones included.
    pub fn plan<'a>(&'a self, plan_id: &'a str) -> impl Iterator<Item = &'a Transaction> {
        self.transactions.iter().filter(move |tx| tx.in_plan(plan_id))
    }

    pub fn dirty_count(&self) -> usize {
        self.transactions
            .iter()
            .filter(|tx| tx.sync_status == SyncStatus::Dirty)
            .count()
    }
}
