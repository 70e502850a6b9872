//! Scoped create/update/delete over the record collection.
//!
//! [`apply`] is a pure state transition: it works on a copy of the state and
//! hands the new state back only when the command succeeds, so a caller that
//! keeps the previous value on error never observes a half-applied command.
//!
//! Deletes are soft: rows are flagged `deleted` and stamped so the tombstone
//! can reach the remote store. Rows are never removed from the collection.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};

use crate::{
    Command, CreateCmd, DeleteCmd, EngineError, ResultEngine, Scope, State, SyncStatus,
    Transaction, TransactionDraft, UpdateCmd,
    calendar::{self, YearMonth},
    series::{self, Horizon},
    util::{new_id, normalize_optional_text, parse_end_month},
};

/// Horizon used on create when the caller gives an explicit end month.
pub const EXPLICIT_END_MONTHS_AHEAD: u32 = 60;
/// Safety cap on how far an end-month change may extend a plan.
pub const MAX_EXTENSION_MONTHS: u32 = 120;

/// Result of a successful command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Applied {
    /// The row the command targeted (the base row on create).
    pub id: String,
    /// Every row whose content changed, including rows created by the
    /// command.
    pub touched: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Transition {
    pub state: State,
    pub applied: Applied,
}

/// Runs `command` against `state`, stamping touched rows with `now`.
///
/// # Errors
///
/// - [`EngineError::Validation`] when the draft, patch or end month is
///   rejected;
/// - [`EngineError::NotFound`] when an update or delete targets an unknown
///   id.
///
/// In both cases `state` is left as it was.
pub fn apply(state: &State, command: Command, now: DateTime<Utc>) -> ResultEngine<Transition> {
    let mut next = state.clone();
    let applied = match command {
        Command::Create(cmd) => create(&mut next.transactions, cmd, now)?,
        Command::Update(cmd) => update(&mut next.transactions, cmd, now)?,
        Command::Delete(cmd) => delete(&mut next.transactions, cmd, now)?,
        Command::Upsert(record) => upsert(&mut next.transactions, record),
    };
    tracing::debug!(
        id = %applied.id,
        touched = applied.touched.len(),
        "applied command"
    );
    Ok(Transition {
        state: next,
        applied,
    })
}

fn position(rows: &[Transaction], id: &str) -> ResultEngine<usize> {
    rows.iter()
        .position(|tx| tx.id == id)
        .ok_or_else(|| EngineError::NotFound(id.to_string()))
}

/// Rejects `target` when another live row of its plan already holds its
/// month.
fn ensure_month_free(rows: &[Transaction], target: &Transaction) -> ResultEngine<()> {
    let Some(plan_id) = target.plan_id.as_deref().filter(|_| target.is_live()) else {
        return Ok(());
    };
    let taken = rows.iter().any(|tx| {
        tx.id != target.id && tx.is_live() && tx.in_plan(plan_id) && tx.month == target.month
    });
    if taken {
        return Err(EngineError::Validation(format!(
            "plan {plan_id} already has a transaction in {}",
            target.month
        )));
    }
    Ok(())
}

fn create(rows: &mut Vec<Transaction>, cmd: CreateCmd, now: DateTime<Utc>) -> ResultEngine<Applied> {
    cmd.draft.validate()?;
    let end_month = parse_end_month(cmd.end_month.as_deref())?;

    let TransactionDraft {
        date,
        kind,
        item,
        category,
        amount,
        is_fixed,
        plan_id,
    } = cmd.draft;
    let date = date.trim().to_string();
    let plan_id = match plan_id {
        Some(plan_id) => Some(plan_id),
        None if is_fixed => Some(new_id()),
        None => None,
    };

    let base = Transaction {
        id: new_id(),
        month: calendar::month_of(&date),
        date,
        kind,
        item: item.trim().to_string(),
        category: normalize_optional_text(category.as_deref()),
        amount,
        is_fixed,
        plan_id,
        updated_at: now,
        deleted: false,
        sync_status: SyncStatus::Dirty,
    };
    ensure_month_free(rows, &base)?;

    let generated = if base.series_plan().is_some() {
        let horizon = match end_month {
            Some(end_month) => Horizon::Capped {
                months_ahead: EXPLICIT_END_MONTHS_AHEAD,
                end_month,
            },
            None => Horizon::default(),
        };
        series::generate_occurrences(&base, rows, horizon, now)
    } else {
        Vec::new()
    };

    let id = base.id.clone();
    let mut touched = Vec::with_capacity(generated.len() + 1);
    touched.push(id.clone());
    touched.extend(generated.iter().map(|tx| tx.id.clone()));

    rows.push(base);
    rows.extend(generated);
    Ok(Applied { id, touched })
}

fn update(rows: &mut Vec<Transaction>, cmd: UpdateCmd, now: DateTime<Utc>) -> ResultEngine<Applied> {
    cmd.patch.validate()?;
    let end_month = parse_end_month(cmd.fixed_end_month.as_deref())?;
    let index = position(rows, &cmd.id)?;

    let original = rows[index].clone();
    cmd.patch.apply_to(&mut rows[index]);
    if rows[index].month != original.month {
        ensure_month_free(rows, &rows[index])?;
    }
    rows[index].touch(now);
    let mut touched = vec![original.id.clone()];

    if let Some(plan_id) = original.series_plan()
        && cmd.scope != Scope::This
    {
        // Siblings keep their month; only a changed day-of-month moves them.
        let new_day = cmd
            .patch
            .date
            .as_deref()
            .and_then(calendar::parse_date)
            .map(|date| date.day())
            .filter(|day| Some(*day) != original.day());

        for (i, row) in rows.iter_mut().enumerate() {
            if i == index || !row.is_live() || !row.in_plan(plan_id) {
                continue;
            }
            if cmd.scope == Scope::ThisAndFuture && row.month <= original.month {
                continue;
            }
            cmd.patch.apply_shared(row);
            if let Some(day) = new_day {
                row.move_to_day(day);
            }
            row.touch(now);
            touched.push(row.id.clone());
        }
    }

    if let Some(end_month) = end_month
        && let Some(plan_id) = rows[index].series_plan().map(ToString::to_string)
    {
        touched.extend(reshape_plan_end(rows, &plan_id, end_month, now));
    }

    let mut seen = HashSet::new();
    touched.retain(|id| seen.insert(id.clone()));
    Ok(Applied {
        id: cmd.id,
        touched,
    })
}

/// Moves the last month of a plan to `end_month`, trimming or extending the
/// series. Returns the ids of the rows it deleted or created.
fn reshape_plan_end(
    rows: &mut Vec<Transaction>,
    plan_id: &str,
    end_month: YearMonth,
    now: DateTime<Utc>,
) -> Vec<String> {
    let Some(last) = rows
        .iter()
        .filter(|tx| tx.is_live() && tx.in_plan(plan_id))
        .max_by(|a, b| a.month.cmp(&b.month))
        .cloned()
    else {
        return Vec::new();
    };
    let Some(current_end) = YearMonth::parse(&last.month) else {
        return Vec::new();
    };

    let mut touched = Vec::new();
    if end_month < current_end {
        let cutoff = end_month.to_string();
        for row in rows
            .iter_mut()
            .filter(|tx| tx.is_live() && tx.in_plan(plan_id) && tx.month > cutoff)
        {
            row.soft_delete(now);
            touched.push(row.id.clone());
        }
        tracing::debug!(plan_id, end = %end_month, trimmed = touched.len(), "trimmed plan");
    } else if end_month > current_end {
        let horizon = Horizon::Capped {
            months_ahead: MAX_EXTENSION_MONTHS,
            end_month,
        };
        let generated = series::generate_occurrences(&last, rows, horizon, now);
        touched.extend(generated.iter().map(|tx| tx.id.clone()));
        rows.extend(generated);
        tracing::debug!(plan_id, end = %end_month, extended = touched.len(), "extended plan");
    }
    touched
}

fn delete(rows: &mut [Transaction], cmd: DeleteCmd, now: DateTime<Utc>) -> ResultEngine<Applied> {
    let index = position(rows, &cmd.id)?;
    let target = rows[index].clone();

    let mut touched = Vec::new();
    match target.series_plan() {
        Some(plan_id) if cmd.scope != Scope::This => {
            for row in rows.iter_mut() {
                let in_scope = row.in_plan(plan_id)
                    && (cmd.scope == Scope::All || row.month >= target.month || row.id == target.id);
                if in_scope && row.is_live() {
                    row.soft_delete(now);
                    touched.push(row.id.clone());
                }
            }
        }
        _ => {
            let row = &mut rows[index];
            if row.is_live() {
                row.soft_delete(now);
                touched.push(row.id.clone());
            }
        }
    }

    Ok(Applied {
        id: cmd.id,
        touched,
    })
}

fn upsert(rows: &mut Vec<Transaction>, record: Transaction) -> Applied {
    let id = record.id.clone();
    match rows.iter_mut().find(|tx| tx.id == id) {
        Some(row) => *row = record,
        None => rows.push(record),
    }
    Applied {
        touched: vec![id.clone()],
        id,
    }
}
