//! Command structs for engine operations.
//!
//! These types group the parameters of the state transitions run by
//! [`apply`](crate::apply), keeping call sites readable and avoiding long
//! argument lists.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Patch, Transaction, TransactionDraft};

/// Breadth of a scoped edit or delete on a plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    /// Only the targeted row.
    #[default]
    This,
    /// The targeted row and the later months of its plan.
    ThisAndFuture,
    /// Every row of the plan, past and future.
    All,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::This => "this",
            Self::ThisAndFuture => "thisAndFuture",
            Self::All => "all",
        }
    }

    /// Lenient parse: a missing or unknown value means [`Scope::This`].
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value.and_then(|raw| raw.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "this" => Ok(Self::This),
            "thisAndFuture" => Ok(Self::ThisAndFuture),
            "all" => Ok(Self::All),
            other => Err(format!("invalid scope: {other}")),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create a transaction, plus its future occurrences when it is fixed.
#[derive(Clone, Debug)]
pub struct CreateCmd {
    pub draft: TransactionDraft,
    /// Inclusive `"YYYY-MM"` end of the series.
    pub end_month: Option<String>,
}

impl CreateCmd {
    #[must_use]
    pub fn new(draft: TransactionDraft) -> Self {
        Self {
            draft,
            end_month: None,
        }
    }

    #[must_use]
    pub fn end_month(mut self, end_month: impl Into<String>) -> Self {
        self.end_month = Some(end_month.into());
        self
    }
}

/// Update a transaction and, depending on the scope, its plan siblings.
#[derive(Clone, Debug)]
pub struct UpdateCmd {
    pub id: String,
    pub patch: Patch,
    pub scope: Scope,
    /// New inclusive `"YYYY-MM"` end of the plan: earlier ends trim the
    /// series, later ends extend it.
    pub fixed_end_month: Option<String>,
}

impl UpdateCmd {
    #[must_use]
    pub fn new(id: impl Into<String>, patch: Patch) -> Self {
        Self {
            id: id.into(),
            patch,
            scope: Scope::This,
            fixed_end_month: None,
        }
    }

    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    #[must_use]
    pub fn fixed_end_month(mut self, end_month: impl Into<String>) -> Self {
        self.fixed_end_month = Some(end_month.into());
        self
    }
}

/// Soft-delete a transaction and, depending on the scope, its siblings.
#[derive(Clone, Debug)]
pub struct DeleteCmd {
    pub id: String,
    pub scope: Scope,
}

impl DeleteCmd {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: Scope::This,
        }
    }

    #[must_use]
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

/// A state transition request.
#[derive(Clone, Debug)]
pub enum Command {
    Create(CreateCmd),
    Update(UpdateCmd),
    Delete(DeleteCmd),
    /// Store a replica of a record as-is (same id, same `updated_at`),
    /// replacing any previous version. Never generates occurrences.
    Upsert(Transaction),
}

impl From<CreateCmd> for Command {
    fn from(cmd: CreateCmd) -> Self {
        Self::Create(cmd)
    }
}

impl From<UpdateCmd> for Command {
    fn from(cmd: UpdateCmd) -> Self {
        Self::Update(cmd)
    }
}

impl From<DeleteCmd> for Command {
    fn from(cmd: DeleteCmd) -> Self {
        Self::Delete(cmd)
    }
}
