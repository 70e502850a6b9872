//! Point-in-time balance computation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Transaction, TransactionKind, calendar};

/// Baseline amount the ledger starts from. Records dated before `date` are
/// not counted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialBalance {
    pub amount: Decimal,
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceOnDate {
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

/// Totals of live records dated on or before `date` (and on or after the
/// initial balance date, when one is given).
///
/// A malformed `date` yields zero totals on top of the base amount; records
/// with a malformed date are skipped.
pub fn compute_balance_on_date(
    records: &[Transaction],
    date: &str,
    initial: Option<&InitialBalance>,
) -> BalanceOnDate {
    let base = initial.map_or(Decimal::ZERO, |initial| initial.amount);
    let origin = initial.and_then(|initial| calendar::parse_date(&initial.date));
    let Some(until) = calendar::parse_date(date) else {
        return BalanceOnDate {
            balance: base,
            ..BalanceOnDate::default()
        };
    };

    let (income, expense) = counted(records, origin, until).fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(income, expense), tx| match tx.kind {
            TransactionKind::Income => (income + tx.amount, expense),
            TransactionKind::Expense => (income, expense + tx.amount),
        },
    );

    BalanceOnDate {
        income,
        expense,
        balance: base + income - expense,
    }
}

/// Net amount (income minus expense) of live records dated in
/// `(after, until]`.
pub fn net_between(records: &[Transaction], after: &str, until: &str) -> Decimal {
    let (Some(after), Some(until)) = (calendar::parse_date(after), calendar::parse_date(until))
    else {
        return Decimal::ZERO;
    };
    let after = after.succ_opt();
    counted(records, after, until)
        .map(Transaction::signed_amount)
        .sum()
}

fn counted(
    records: &[Transaction],
    from: Option<NaiveDate>,
    until: NaiveDate,
) -> impl Iterator<Item = &Transaction> {
    records.iter().filter(move |tx| {
        if !tx.is_live() {
            return false;
        }
        let Some(date) = calendar::parse_date(&tx.date) else {
            return false;
        };
        date <= until && from.is_none_or(|from| date >= from)
    })
}
