//! Transaction primitives.
//!
//! A `Transaction` is one dated income or expense. Recurring ("fixed")
//! transactions share a `plan_id` with the other occurrences of the same
//! rule, one per month.

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine,
    calendar::{self, YearMonth},
    util::normalize_optional_text,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            other => Err(EngineError::Validation(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

/// Replication state of a local record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Carries changes the remote store has not seen yet.
    #[default]
    Dirty,
    Synced,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `YYYY-MM`, always derived from `date`.
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
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl Transaction {
    /// Returns `true` if the record has not been soft-deleted.
    pub fn is_live(&self) -> bool {
        !self.deleted
    }

    pub fn in_plan(&self, plan_id: &str) -> bool {
        self.plan_id.as_deref() == Some(plan_id)
    }

    /// A record takes part in series operations only when it is fixed and
    /// carries a plan id.
    pub fn series_plan(&self) -> Option<&str> {
        if self.is_fixed {
            self.plan_id.as_deref()
        } else {
            None
        }
    }

    /// Day of month, if the date parses.
    pub fn day(&self) -> Option<u32> {
        calendar::parse_date(&self.date).map(|date| date.day())
    }

    /// Stamps a local mutation.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.sync_status = SyncStatus::Dirty;
    }

    pub fn soft_delete(&mut self, now: DateTime<Utc>) {
        self.deleted = true;
        self.touch(now);
    }

    /// Moves the record to `day` within its own month, clamped to the month
    /// length. The month never changes.
    pub fn move_to_day(&mut self, day: u32) {
        if let Some(date) = YearMonth::parse(&self.month).and_then(|m| m.clamped_date(day)) {
            self.date = calendar::format_date(date);
        }
    }

    /// Signed contribution to a balance.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Income => self.amount,
            TransactionKind::Expense => -self.amount,
        }
    }
}

/// User input for a new transaction, before ids and timestamps are assigned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionDraft {
    pub date: String,
    pub kind: TransactionKind,
    pub item: String,
    pub category: Option<String>,
    pub amount: Decimal,
    pub is_fixed: bool,
    pub plan_id: Option<String>,
}

impl TransactionDraft {
    #[must_use]
    pub fn new(
        date: impl Into<String>,
        kind: TransactionKind,
        item: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            date: date.into(),
            kind,
            item: item.into(),
            category: None,
            amount,
            is_fixed: false,
            plan_id: None,
        }
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn fixed(mut self, is_fixed: bool) -> Self {
        self.is_fixed = is_fixed;
        self
    }

    #[must_use]
    pub fn plan_id(mut self, plan_id: impl Into<String>) -> Self {
        self.plan_id = Some(plan_id.into());
        self
    }

    /// Boundary validation: rejects the draft before any state is touched.
    pub fn validate(&self) -> ResultEngine<()> {
        validate_item(&self.item)?;
        validate_date(&self.date)?;
        validate_amount(self.amount)
    }
}

/// A partial update. Absent fields are left unchanged.
///
/// `category` is doubly optional: `Some(None)` clears it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Patch {
    pub date: Option<String>,
    pub kind: Option<TransactionKind>,
    pub item: Option<String>,
    pub category: Option<Option<String>>,
    pub amount: Option<Decimal>,
    pub is_fixed: Option<bool>,
}

impl Patch {
    #[must_use]
    pub fn date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: TransactionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: Option<String>) -> Self {
        self.category = Some(category);
        self
    }

    #[must_use]
    pub fn amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn fixed(mut self, is_fixed: bool) -> Self {
        self.is_fixed = Some(is_fixed);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> ResultEngine<()> {
        if let Some(item) = &self.item {
            validate_item(item)?;
        }
        if let Some(date) = &self.date {
            validate_date(date)?;
        }
        if let Some(amount) = self.amount {
            validate_amount(amount)?;
        }
        Ok(())
    }

    /// Applies every present field. A new date also moves the record to the
    /// matching month.
    pub fn apply_to(&self, tx: &mut Transaction) {
        if let Some(date) = &self.date {
            tx.date = date.trim().to_string();
            tx.month = calendar::month_of(&tx.date);
        }
        self.apply_shared(tx);
    }

    /// Applies only the fields that are safe to copy onto sibling
    /// occurrences of a plan: everything but the date.
    pub fn apply_shared(&self, tx: &mut Transaction) {
        if let Some(kind) = self.kind {
            tx.kind = kind;
        }
        if let Some(item) = &self.item {
            tx.item = item.trim().to_string();
        }
        if let Some(category) = &self.category {
            tx.category = normalize_optional_text(category.as_deref());
        }
        if let Some(amount) = self.amount {
            tx.amount = amount;
        }
        if let Some(is_fixed) = self.is_fixed {
            tx.is_fixed = is_fixed;
        }
    }
}

fn validate_item(item: &str) -> ResultEngine<()> {
    if item.trim().is_empty() {
        return Err(EngineError::Validation(
            "item must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_date(date: &str) -> ResultEngine<()> {
    calendar::parse_date(date)
        .map(|_| ())
        .ok_or_else(|| EngineError::Validation(format!("invalid date: {date}")))
}

fn validate_amount(amount: Decimal) -> ResultEngine<()> {
    if amount < Decimal::ZERO {
        return Err(EngineError::Validation(
            "amount must be >= 0".to_string(),
        ));
    }
    Ok(())
}
