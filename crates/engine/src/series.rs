//! Occurrence generation for recurring plans.
//!
//! [`generate_occurrences`] derives the monthly occurrences that follow a
//! template record. It is pure: it never mutates its inputs and returns only
//! the rows that are missing from the existing set, so running it again over
//! its own output yields nothing.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};

use crate::{
    SyncStatus, Transaction,
    calendar::{self, YearMonth},
    util::new_id,
};

/// Months generated after the template when no end month is given.
pub const DEFAULT_MONTHS_AHEAD: u32 = 11;

/// How far ahead a series is generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Horizon {
    /// A plain count of months after the template month.
    Months(u32),
    /// A count of months, stopping early after `end_month` (inclusive).
    Capped {
        months_ahead: u32,
        end_month: YearMonth,
    },
}

impl Default for Horizon {
    fn default() -> Self {
        Self::Months(DEFAULT_MONTHS_AHEAD)
    }
}

impl Horizon {
    pub fn months_ahead(self) -> u32 {
        match self {
            Self::Months(months) => months,
            Self::Capped { months_ahead, .. } => months_ahead,
        }
    }

    pub fn end_month(self) -> Option<YearMonth> {
        match self {
            Self::Months(_) => None,
            Self::Capped { end_month, .. } => Some(end_month),
        }
    }
}

/// Returns the occurrences of `template`'s plan that `existing` lacks.
///
/// The day of month follows the template, clamped to each target month's
/// length. A month that already holds a live occurrence of the plan is
/// skipped. A template without a parseable date, a parseable month or a plan
/// id yields no rows.
pub fn generate_occurrences(
    template: &Transaction,
    existing: &[Transaction],
    horizon: Horizon,
    now: DateTime<Utc>,
) -> Vec<Transaction> {
    let Some(plan_id) = template.plan_id.as_deref() else {
        return Vec::new();
    };
    let (Some(date), Some(start)) = (
        calendar::parse_date(&template.date),
        YearMonth::parse(&template.month),
    ) else {
        return Vec::new();
    };

    let taken: HashSet<&str> = existing
        .iter()
        .filter(|tx| tx.is_live() && tx.in_plan(plan_id))
        .map(|tx| tx.month.as_str())
        .collect();

    let end_month = horizon.end_month();
    let mut generated = Vec::new();
    for offset in 1..=horizon.months_ahead() {
        let target = start.plus_months(offset);
        if let Some(end) = end_month
            && target > end
        {
            break;
        }
        let month = target.to_string();
        if taken.contains(month.as_str()) {
            continue;
        }
        let Some(occurs_on) = target.clamped_date(date.day()) else {
            continue;
        };
        generated.push(Transaction {
            id: new_id(),
            date: calendar::format_date(occurs_on),
            month,
            updated_at: now,
            deleted: false,
            sync_status: SyncStatus::Dirty,
            ..template.clone()
        });
    }

    tracing::debug!(
        plan_id,
        from = %start,
        generated = generated.len(),
        "generated plan occurrences"
    );
    generated
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::TransactionKind;

    fn template(date: &str) -> Transaction {
        Transaction {
            id: "base".to_string(),
            date: date.to_string(),
            month: calendar::month_of(date),
            kind: TransactionKind::Expense,
            item: "Rent".to_string(),
            category: None,
            amount: Decimal::from(100),
            is_fixed: true,
            plan_id: Some("p1".to_string()),
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
            deleted: false,
            sync_status: SyncStatus::Synced,
        }
    }

    fn dates(rows: &[Transaction]) -> Vec<&str> {
        rows.iter().map(|tx| tx.date.as_str()).collect()
    }

    #[test]
    fn month_end_template_is_clamped() {
        let base = template("2025-01-31");
        let rows = generate_occurrences(&base, &[base.clone()], Horizon::Months(3), Utc::now());
        assert_eq!(dates(&rows), ["2025-02-28", "2025-03-31", "2025-04-30"]);
    }

    #[test]
    fn generated_rows_are_fresh_and_dirty() {
        let base = template("2025-01-15");
        let now = Utc::now();
        let rows = generate_occurrences(&base, &[], Horizon::Months(2), now);
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_ne!(row.id, base.id);
            assert_eq!(row.plan_id, base.plan_id);
            assert_eq!(row.updated_at, now);
            assert_eq!(row.sync_status, SyncStatus::Dirty);
            assert!(!row.deleted);
        }
        assert_ne!(rows[0].id, rows[1].id);
    }

    #[test]
    fn end_month_caps_the_series() {
        let base = template("2025-01-10");
        let horizon = Horizon::Capped {
            months_ahead: 60,
            end_month: YearMonth::parse("2025-06").unwrap(),
        };
        let rows = generate_occurrences(&base, &[], horizon, Utc::now());
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|tx| tx.month.as_str() <= "2025-06"));
    }

    #[test]
    fn rerun_over_own_output_is_empty() {
        let base = template("2025-01-10");
        let mut existing = vec![base.clone()];
        existing.extend(generate_occurrences(&base, &existing, Horizon::default(), Utc::now()));
        assert_eq!(existing.len(), 12);

        let again = generate_occurrences(&base, &existing, Horizon::default(), Utc::now());
        assert!(again.is_empty());
    }

    #[test]
    fn deleted_occurrences_do_not_block_generation() {
        let base = template("2025-01-10");
        let mut march = template("2025-03-10");
        march.id = "march".to_string();
        march.deleted = true;

        let rows = generate_occurrences(&base, &[march], Horizon::Months(3), Utc::now());
        assert_eq!(dates(&rows), ["2025-02-10", "2025-03-10", "2025-04-10"]);
    }

    #[test]
    fn other_plans_do_not_block_generation() {
        let base = template("2025-01-10");
        let mut other = template("2025-02-10");
        other.plan_id = Some("p2".to_string());

        let rows = generate_occurrences(&base, &[other], Horizon::Months(1), Utc::now());
        assert_eq!(dates(&rows), ["2025-02-10"]);
    }

    #[test]
    fn malformed_template_yields_nothing() {
        let mut no_date = template("2025-01-10");
        no_date.date = String::new();
        assert!(generate_occurrences(&no_date, &[], Horizon::default(), Utc::now()).is_empty());

        let mut no_month = template("2025-01-10");
        no_month.month = "garbage".to_string();
        assert!(generate_occurrences(&no_month, &[], Horizon::default(), Utc::now()).is_empty());

        let mut no_plan = template("2025-01-10");
        no_plan.plan_id = None;
        assert!(generate_occurrences(&no_plan, &[], Horizon::default(), Utc::now()).is_empty());
    }
}
