//! JSON bodies exchanged between the server and its clients.
//!
//! Field names are camelCase on the wire. Replication metadata that only
//! matters locally (`syncStatus`) never leaves a replica.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn yes() -> bool {
    true
}

pub mod transaction {
    use engine::{Patch, SyncStatus, Transaction, TransactionDraft, TransactionKind};

    use super::*;

    /// A stored transaction as the server reports it.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionRecord {
        pub id: String,
        pub date: String,
        pub month: String,
        #[serde(rename = "type")]
        pub kind: TransactionKind,
        pub item: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category: Option<String>,
        pub amount: Decimal,
        #[serde(default)]
        pub is_fixed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub plan_id: Option<String>,
        pub updated_at: DateTime<Utc>,
        #[serde(default)]
        pub deleted: bool,
        /// Server time of the last write, set on `GET /transactions/changes`.
        /// Pass the largest one seen as the next `since`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub changed_at: Option<DateTime<Utc>>,
    }

    impl From<Transaction> for TransactionRecord {
        fn from(tx: Transaction) -> Self {
            Self {
                id: tx.id,
                date: tx.date,
                month: tx.month,
                kind: tx.kind,
                item: tx.item,
                category: tx.category,
                amount: tx.amount,
                is_fixed: tx.is_fixed,
                plan_id: tx.plan_id,
                updated_at: tx.updated_at,
                deleted: tx.deleted,
                changed_at: None,
            }
        }
    }

    impl From<TransactionRecord> for Transaction {
        /// Whatever a remote reports is, by definition, what it has seen.
        fn from(record: TransactionRecord) -> Self {
            Self {
                id: record.id,
                date: record.date,
                month: record.month,
                kind: record.kind,
                item: record.item,
                category: record.category,
                amount: record.amount,
                is_fixed: record.is_fixed,
                plan_id: record.plan_id,
                updated_at: record.updated_at,
                deleted: record.deleted,
                sync_status: SyncStatus::Synced,
            }
        }
    }

    /// Body of `POST /transactions`.
    ///
    /// With `expandSeries` (the default) the server runs a regular create and
    /// generates the future occurrences of a fixed transaction. Without it the
    /// body is a replica of an existing record: `id` and `updatedAt` are kept
    /// and nothing is generated.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionNew {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<String>,
        pub date: String,
        #[serde(rename = "type")]
        pub kind: TransactionKind,
        pub item: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub category: Option<String>,
        pub amount: Decimal,
        #[serde(default)]
        pub is_fixed: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub plan_id: Option<String>,
        /// Last month (`YYYY-MM`) a new series may reach.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub end_month: Option<String>,
        #[serde(default = "yes")]
        pub expand_series: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub updated_at: Option<DateTime<Utc>>,
        #[serde(default)]
        pub deleted: bool,
    }

    impl TransactionNew {
        /// Replica body for pushing `tx` as-is.
        pub fn replica(tx: &Transaction) -> Self {
            Self {
                id: Some(tx.id.clone()),
                date: tx.date.clone(),
                kind: tx.kind,
                item: tx.item.clone(),
                category: tx.category.clone(),
                amount: tx.amount,
                is_fixed: tx.is_fixed,
                plan_id: tx.plan_id.clone(),
                end_month: None,
                expand_series: false,
                updated_at: Some(tx.updated_at),
                deleted: tx.deleted,
            }
        }

        pub fn draft(&self) -> TransactionDraft {
            TransactionDraft {
                date: self.date.clone(),
                kind: self.kind,
                item: self.item.clone(),
                category: self.category.clone(),
                amount: self.amount,
                is_fixed: self.is_fixed,
                plan_id: self.plan_id.clone(),
            }
        }
    }

    /// Body of `PUT /transactions/{id}`. Absent fields are left unchanged;
    /// `"category": null` clears the category.
    ///
    /// With `updatedAt` the body is a replica push: the scope is ignored, the
    /// write is refused when the stored row is newer, and `deleted` is taken
    /// as sent.
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct TransactionUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub date: Option<String>,
        #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
        pub kind: Option<TransactionKind>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub item: Option<String>,
        #[serde(
            default,
            deserialize_with = "double_option",
            skip_serializing_if = "Option::is_none"
        )]
        pub category: Option<Option<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub amount: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub is_fixed: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub fixed_end_month: Option<String>,
        /// Stamp to record instead of the server clock. Replicas pushing a
        /// local edit send the time of that edit.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub updated_at: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub deleted: Option<bool>,
    }

    impl TransactionUpdate {
        /// Replica body overwriting every editable field with `tx`.
        pub fn replica(tx: &Transaction) -> Self {
            Self {
                date: Some(tx.date.clone()),
                kind: Some(tx.kind),
                item: Some(tx.item.clone()),
                category: Some(tx.category.clone()),
                amount: Some(tx.amount),
                is_fixed: Some(tx.is_fixed),
                fixed_end_month: None,
                updated_at: Some(tx.updated_at),
                deleted: Some(tx.deleted),
            }
        }

        pub fn patch(&self) -> Patch {
            Patch {
                date: self.date.clone(),
                kind: self.kind,
                item: self.item.clone(),
                category: self.category.clone(),
                amount: self.amount,
                is_fixed: self.is_fixed,
            }
        }
    }

    /// `?scope=this|thisAndFuture|all`. Kept as a raw string so an unknown
    /// value falls back to `this` instead of failing the request.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ScopeQuery {
        pub scope: Option<String>,
    }

    /// Query of `DELETE /transactions/{id}`. A replica pushing a tombstone
    /// sends its `updatedAt`; the delete is then refused when the stored row
    /// is newer.
    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct DeleteQuery {
        pub scope: Option<String>,
        pub updated_at: Option<DateTime<Utc>>,
    }

    /// `?since=<RFC 3339>`, compared with `changedAt`
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ChangesQuery {
        pub since: Option<DateTime<Utc>>,
    }

    /// Ids a scoped update stamped.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct Touched {
        pub touched: Vec<String>,
    }
}

pub mod settings {
    pub use engine::InitialBalance;
}

pub mod balance {
    use super::*;

    pub use engine::BalanceOnDate;

    /// `?date=YYYY-MM-DD`
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceQuery {
        pub date: String,
    }
}

#[cfg(test)]
mod tests {
    use engine::TransactionKind;

    use super::transaction::*;

    #[test]
    fn update_tells_null_category_from_absent() {
        let clear: TransactionUpdate = serde_json::from_str(r#"{"category": null}"#).unwrap();
        assert_eq!(clear.category, Some(None));
        assert_eq!(clear.patch().category, Some(None));

        let untouched: TransactionUpdate = serde_json::from_str(r#"{"amount": 12.5}"#).unwrap();
        assert_eq!(untouched.category, None);
        assert!(untouched.amount.is_some());
    }

    #[test]
    fn new_expands_series_unless_told_otherwise() {
        let body: TransactionNew = serde_json::from_str(
            r#"{"date": "2025-01-31", "type": "expense", "item": "Rent", "amount": 900, "isFixed": true}"#,
        )
        .unwrap();
        assert!(body.expand_series);
        assert_eq!(body.kind, TransactionKind::Expense);
        assert!(body.draft().is_fixed);
    }

    #[test]
    fn record_never_carries_sync_status() {
        let record: TransactionRecord = serde_json::from_str(
            r#"{"id": "a", "date": "2025-02-03", "month": "2025-02", "type": "income",
                "item": "Pay", "amount": 10, "updatedAt": "2025-02-03T10:00:00Z"}"#,
        )
        .unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("syncStatus").is_none());
        assert!(json.get("changedAt").is_none());
        assert_eq!(json["updatedAt"], "2025-02-03T10:00:00Z");
    }

    #[test]
    fn replica_update_carries_the_tombstone_flag() {
        let record: TransactionRecord = serde_json::from_str(
            r#"{"id": "a", "date": "2025-02-03", "month": "2025-02", "type": "income",
                "item": "Pay", "amount": 10, "updatedAt": "2025-02-03T10:00:00Z",
                "deleted": true, "changedAt": "2025-02-04T08:00:00Z"}"#,
        )
        .unwrap();
        assert!(record.changed_at.is_some());

        let body = TransactionUpdate::replica(&record.into());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["deleted"], true);
        assert_eq!(json["updatedAt"], "2025-02-03T10:00:00Z");
    }
}
