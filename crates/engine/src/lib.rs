//! Recurring-transaction engine shared by the server and the client.
//!
//! - [`series`] derives the monthly occurrences of a fixed transaction.
//! - [`apply`] runs scoped create/update/delete commands as pure state
//!   transitions.
//! - [`balance`] computes point-in-time balances.
//! - [`sync`] reconciles a local replica with a [`RemoteStore`].
//! - [`Ledger`] owns a replica's state and serializes its writers.

pub use balance::{BalanceOnDate, InitialBalance, compute_balance_on_date, net_between};
pub use calendar::YearMonth;
pub use commands::{Command, CreateCmd, DeleteCmd, Scope, UpdateCmd};
pub use error::EngineError;
pub use ledger::Ledger;
pub use mutator::{Applied, Transition, apply};
pub use series::{Horizon, generate_occurrences};
pub use state::State;
pub use sync::{Changes, RemoteError, RemoteStore, SyncError, SyncReconciler, SyncReport, merge_remote};
pub use transactions::{Patch, SyncStatus, Transaction, TransactionDraft, TransactionKind};

pub mod balance;
pub mod calendar;
mod commands;
mod error;
mod ledger;
pub mod mutator;
pub mod series;
mod state;
pub mod sync;
mod transactions;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
