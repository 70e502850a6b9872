//! The subcommands, run against the local replica.
//!
//! Every edit lands in the local ledger first and reaches the server on the
//! next `sync`, so the client keeps working offline.

use std::fmt::Write as _;

use chrono::Utc;
use engine::{
    CreateCmd, DeleteCmd, EngineError, InitialBalance, Ledger, Patch, RemoteError, SyncReconciler,
    SyncStatus, Transaction, TransactionDraft, UpdateCmd, calendar,
};

use crate::{
    client::HttpRemote,
    config::Action,
    error::{AppError, Result},
    local_state::LocalState,
};

/// Runs `action` on `local` and returns what to print. On error `local` is
/// left as it was.
pub async fn execute(action: Action, local: &mut LocalState, remote: &HttpRemote) -> Result<String> {
    let ledger = Ledger::new(std::mem::take(&mut local.ledger));
    let result = run(action, &ledger, &mut local.initial_balance, remote).await;
    local.ledger = ledger.into_state();
    result
}

async fn run(
    action: Action,
    ledger: &Ledger,
    initial: &mut Option<InitialBalance>,
    remote: &HttpRemote,
) -> Result<String> {
    match action {
        Action::List { month } => {
            let state = ledger.snapshot().await;
            let mut rows: Vec<_> = state
                .live()
                .filter(|tx| month.as_deref().is_none_or(|month| tx.month == month))
                .collect();
            rows.sort_by(|a, b| a.date.cmp(&b.date));
            if rows.is_empty() {
                return Ok("no transactions".to_string());
            }
            Ok(rows.into_iter().map(line).collect::<Vec<_>>().join("\n"))
        }
        Action::Add {
            date,
            kind,
            item,
            amount,
            category,
            fixed,
            end_month,
        } => {
            let mut draft = TransactionDraft::new(date, kind, item, amount).fixed(fixed);
            if let Some(category) = category {
                draft = draft.category(category);
            }
            let mut cmd = CreateCmd::new(draft);
            if let Some(end_month) = end_month {
                cmd = cmd.end_month(end_month);
            }
            let applied = ledger.dispatch(cmd.into()).await?;
            Ok(format!("added {} ({} rows)", applied.id, applied.touched.len()))
        }
        Action::Edit {
            id,
            scope,
            date,
            kind,
            item,
            category,
            clear_category,
            amount,
            fixed,
            end_month,
        } => {
            let patch = Patch {
                date,
                kind,
                item,
                category: if clear_category {
                    Some(None)
                } else {
                    category.map(Some)
                },
                amount,
                is_fixed: fixed,
            };
            if patch.is_empty() && end_month.is_none() {
                return Err(EngineError::Validation("nothing to change".to_string()).into());
            }
            let mut cmd = UpdateCmd::new(id, patch).scope(scope);
            if let Some(end_month) = end_month {
                cmd = cmd.fixed_end_month(end_month);
            }
            let applied = ledger.dispatch(cmd.into()).await?;
            Ok(format!("updated {} rows", applied.touched.len()))
        }
        Action::Delete { id, scope } => {
            let applied = ledger.dispatch(DeleteCmd::new(id).scope(scope).into()).await?;
            Ok(format!("deleted {} rows", applied.touched.len()))
        }
        Action::Balance { date } => {
            let date = match date {
                Some(date) => date.trim().to_string(),
                None => calendar::format_date(Utc::now().date_naive()),
            };
            if calendar::parse_date(&date).is_none() {
                return Err(EngineError::Validation(format!("invalid date: {date}")).into());
            }
            let balance = ledger.balance_on(&date, initial.as_ref()).await;
            Ok(format!(
                "{date}: income {} expense {} balance {}",
                balance.income, balance.expense, balance.balance
            ))
        }
        Action::Sync => {
            let sync = SyncReconciler::new(remote.clone());
            let report = sync.run(ledger).await?;
            // The cycle already merged; a failed refresh keeps the cached value.
            match remote.initial_balance().await {
                Ok(value) => *initial = value,
                Err(err) => tracing::warn!("initial balance not refreshed: {err}"),
            }
            Ok(format!(
                "pushed {}, created {}, deleted {}, pulled {}",
                report.pushed, report.created, report.deleted, report.pulled
            ))
        }
        Action::InitialBalance { amount, date } => {
            initial_balance(amount.zip(date), initial, remote).await
        }
    }
}

async fn initial_balance(
    new: Option<(rust_decimal::Decimal, String)>,
    cached: &mut Option<InitialBalance>,
    remote: &HttpRemote,
) -> Result<String> {
    if let Some((amount, date)) = new {
        let date = date.trim().to_string();
        if calendar::parse_date(&date).is_none() {
            return Err(EngineError::Validation(format!("invalid date: {date}")).into());
        }
        let stored = remote
            .set_initial_balance(&InitialBalance { amount, date })
            .await?;
        let out = describe(&stored, "set");
        *cached = Some(stored);
        return Ok(out);
    }

    match remote.initial_balance().await {
        Ok(Some(value)) => {
            let out = describe(&value, "initial balance");
            *cached = Some(value);
            Ok(out)
        }
        Ok(None) => {
            *cached = None;
            Ok("no initial balance set".to_string())
        }
        Err(RemoteError::Network(err)) => {
            tracing::warn!("server unreachable, using cached initial balance: {err}");
            Ok(cached.as_ref().map_or_else(
                || "no initial balance known offline".to_string(),
                |value| describe(value, "initial balance (cached)"),
            ))
        }
        Err(err) => Err(AppError::Server(err)),
    }
}

fn describe(value: &InitialBalance, label: &str) -> String {
    format!("{label}: {} from {}", value.amount, value.date)
}

fn line(tx: &Transaction) -> String {
    let mut out = format!(
        "{}  {:<7}  {:>10}  {}",
        tx.date,
        tx.kind.as_str(),
        tx.amount,
        tx.item
    );
    if let Some(category) = &tx.category {
        let _ = write!(out, " [{category}]");
    }
    if tx.is_fixed {
        out.push_str(" (fixed)");
    }
    let _ = write!(out, "  {}", tx.id);
    if tx.sync_status == SyncStatus::Dirty {
        out.push_str(" *");
    }
    out
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use engine::{Scope, State, TransactionKind};

    /// Nothing listens on port 9, so every remote call fails to connect.
    fn offline() -> HttpRemote {
        HttpRemote::new("http://127.0.0.1:9").unwrap()
    }

    fn add_rent() -> Action {
        Action::Add {
            date: "2025-01-31".to_string(),
            kind: TransactionKind::Expense,
            item: "Rent".to_string(),
            amount: Decimal::from(900),
            category: Some("home".to_string()),
            fixed: true,
            end_month: Some("2025-06".to_string()),
        }
    }

    #[tokio::test]
    async fn edits_work_offline() {
        let mut local = LocalState::default();
        let remote = offline();

        let out = execute(add_rent(), &mut local, &remote).await.unwrap();
        assert!(out.ends_with("(6 rows)"), "{out}");
        assert_eq!(local.ledger.dirty_count(), 6);

        let april = local
            .ledger
            .live()
            .find(|tx| tx.month == "2025-04")
            .map(|tx| tx.id.clone())
            .unwrap();
        let out = execute(
            Action::Delete {
                id: april,
                scope: Scope::ThisAndFuture,
            },
            &mut local,
            &remote,
        )
        .await
        .unwrap();
        assert_eq!(out, "deleted 3 rows");

        let out = execute(Action::List { month: None }, &mut local, &remote)
            .await
            .unwrap();
        assert_eq!(out.lines().count(), 3);
        assert!(out.lines().all(|line| line.ends_with(" *")));
    }

    #[tokio::test]
    async fn failed_sync_keeps_the_replica() {
        let mut local = LocalState::default();
        let remote = offline();
        execute(add_rent(), &mut local, &remote).await.unwrap();
        let before = local.clone();

        let err = execute(Action::Sync, &mut local, &remote).await.unwrap_err();
        assert!(matches!(err, AppError::Sync(_)));
        assert_eq!(local, before);
    }

    #[tokio::test]
    async fn balance_uses_the_cached_initial_balance() {
        let mut local = LocalState {
            ledger: State::default(),
            initial_balance: Some(InitialBalance {
                amount: Decimal::from(100),
                date: "2025-01-01".to_string(),
            }),
        };
        let remote = offline();
        execute(add_rent(), &mut local, &remote).await.unwrap();

        let out = execute(
            Action::Balance {
                date: Some("2025-03-31".to_string()),
            },
            &mut local,
            &remote,
        )
        .await
        .unwrap();
        assert_eq!(out, "2025-03-31: income 0 expense 2700 balance -2600");

        let out = execute(
            Action::InitialBalance {
                amount: None,
                date: None,
            },
            &mut local,
            &remote,
        )
        .await
        .unwrap();
        assert_eq!(out, "initial balance (cached): 100 from 2025-01-01");
    }

    #[tokio::test]
    async fn empty_edit_is_rejected() {
        let mut local = LocalState::default();
        let err = execute(
            Action::Edit {
                id: "x".to_string(),
                scope: Scope::All,
                date: None,
                kind: None,
                item: None,
                category: None,
                clear_category: false,
                amount: None,
                fixed: None,
                end_month: None,
            },
            &mut local,
            &offline(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Engine(EngineError::Validation(_))));
    }
}
