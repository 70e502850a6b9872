//! The owner of a replica's record collection.
//!
//! Every writer, whether a scoped command or a sync merge, goes through the
//! same lock, so writes are serialized and each one is an atomic swap of the
//! whole [`State`].

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::{
    Applied, BalanceOnDate, Command, InitialBalance, ResultEngine, State, balance,
    mutator::{self, Transition},
    sync::{self, Changes},
};

#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<State>,
}

impl Ledger {
    #[must_use]
    pub fn new(state: State) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Applies `command` stamped with the current time.
    pub async fn dispatch(&self, command: Command) -> ResultEngine<Applied> {
        self.dispatch_at(command, Utc::now()).await
    }

    /// Applies `command` stamped with `now`. On error the state is unchanged.
    pub async fn dispatch_at(&self, command: Command, now: DateTime<Utc>) -> ResultEngine<Applied> {
        let mut state = self.state.lock().await;
        let Transition {
            state: next,
            applied,
        } = mutator::apply(&state, command, now)?;
        *state = next;
        Ok(applied)
    }

    pub async fn snapshot(&self) -> State {
        self.state.lock().await.clone()
    }

    pub async fn replace(&self, state: State) {
        *self.state.lock().await = state;
    }

    pub async fn balance_on(&self, date: &str, initial: Option<&InitialBalance>) -> BalanceOnDate {
        let state = self.state.lock().await;
        balance::compute_balance_on_date(&state.transactions, date, initial)
    }

    /// Merges a pulled batch into the current collection and moves the pull
    /// cursor forward. Returns how many remote records were taken.
    pub(crate) async fn absorb(&self, pushed: &State, changes: Changes) -> usize {
        let mut state = self.state.lock().await;
        let (transactions, adopted) =
            sync::reconcile(&state.transactions, &pushed.transactions, changes.records);
        state.transactions = transactions;
        if changes.cursor.is_some() {
            state.last_sync_at = changes.cursor;
        }
        adopted
    }

    pub fn into_state(self) -> State {
        self.state.into_inner()
    }
}
