//! SQLite persistence of the server replica.
//!
//! Handlers never edit rows directly: they load the rows a command can
//! reach into an engine [`State`], run the command, then write back the
//! touched rows in one database transaction.
//!
//! Every write also sets `changed_at` from the server clock. Clients resume
//! their pulls from it; `updated_at` belongs to whichever device made the
//! edit and only decides conflicts.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use engine::{InitialBalance, State, SyncStatus, Transaction, TransactionKind};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
    sea_query::{Expr, OnConflict},
};

pub mod transaction {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "transactions")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub date: String,
        pub month: String,
        pub kind: String,
        pub item: String,
        pub category: Option<String>,
        pub amount: String,
        pub is_fixed: bool,
        pub plan_id: Option<String>,
        pub updated_at: DateTimeUtc,
        pub deleted: bool,
        pub changed_at: Option<DateTimeUtc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod initial_balance {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
    #[sea_orm(table_name = "initial_balance")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i32,
        pub amount: String,
        pub date: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// The only row of `initial_balance`.
const INITIAL_BALANCE_ROW: i32 = 1;

fn parse_amount(raw: &str) -> Result<Decimal, DbErr> {
    Decimal::from_str(raw).map_err(|err| DbErr::Custom(format!("invalid stored amount {raw}: {err}")))
}

impl transaction::Model {
    /// Server rows are the authoritative copy, hence always synced.
    fn into_transaction(self) -> Result<Transaction, DbErr> {
        let kind = TransactionKind::try_from(self.kind.as_str())
            .map_err(|err| DbErr::Custom(err.to_string()))?;
        Ok(Transaction {
            amount: parse_amount(&self.amount)?,
            id: self.id,
            date: self.date,
            month: self.month,
            kind,
            item: self.item,
            category: self.category,
            is_fixed: self.is_fixed,
            plan_id: self.plan_id,
            updated_at: self.updated_at,
            deleted: self.deleted,
            sync_status: SyncStatus::Synced,
        })
    }
}

fn active_model(tx: &Transaction, changed_at: DateTime<Utc>) -> transaction::ActiveModel {
    transaction::ActiveModel {
        id: ActiveValue::Set(tx.id.clone()),
        date: ActiveValue::Set(tx.date.clone()),
        month: ActiveValue::Set(tx.month.clone()),
        kind: ActiveValue::Set(tx.kind.as_str().to_string()),
        item: ActiveValue::Set(tx.item.clone()),
        category: ActiveValue::Set(tx.category.clone()),
        amount: ActiveValue::Set(tx.amount.to_string()),
        is_fixed: ActiveValue::Set(tx.is_fixed),
        plan_id: ActiveValue::Set(tx.plan_id.clone()),
        updated_at: ActiveValue::Set(tx.updated_at),
        deleted: ActiveValue::Set(tx.deleted),
        changed_at: ActiveValue::Set(Some(changed_at)),
    }
}

fn into_transactions(rows: Vec<transaction::Model>) -> Result<Vec<Transaction>, DbErr> {
    rows.into_iter().map(transaction::Model::into_transaction).collect()
}

/// Non-deleted records, oldest first.
pub async fn list_live(db: &DatabaseConnection) -> Result<Vec<Transaction>, DbErr> {
    let rows = transaction::Entity::find()
        .filter(transaction::Column::Deleted.eq(false))
        .order_by_asc(transaction::Column::Date)
        .all(db)
        .await?;
    into_transactions(rows)
}

/// A stored record and the server time of its last write.
#[derive(Clone, Debug)]
pub struct Changed {
    pub transaction: Transaction,
    pub changed_at: Option<DateTime<Utc>>,
}

/// Every record, tombstones included, written at or after `since`.
pub async fn changes_since(
    db: &DatabaseConnection,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<Changed>, DbErr> {
    let mut query = transaction::Entity::find();
    if let Some(since) = since {
        query = query.filter(transaction::Column::ChangedAt.gte(since));
    }
    let rows = query
        .order_by_asc(transaction::Column::ChangedAt)
        .all(db)
        .await?;
    rows.into_iter()
        .map(|row| {
            let changed_at = row.changed_at;
            Ok(Changed {
                transaction: row.into_transaction()?,
                changed_at,
            })
        })
        .collect()
}

pub async fn load_all(db: &DatabaseConnection) -> Result<State, DbErr> {
    let rows = transaction::Entity::find().all(db).await?;
    Ok(State::new(into_transactions(rows)?))
}

/// Loads the rows a command on `id` or on `plan_id` can reach: the record
/// itself and every row of its plan.
pub async fn load_scope(
    db: &DatabaseConnection,
    id: Option<&str>,
    plan_id: Option<&str>,
) -> Result<State, DbErr> {
    let mut transactions = Vec::new();
    let mut plan_id = plan_id.map(str::to_string);

    if let Some(id) = id
        && let Some(row) = transaction::Entity::find_by_id(id).one(db).await?
    {
        let row = row.into_transaction()?;
        if plan_id.is_none() {
            plan_id.clone_from(&row.plan_id);
        }
        transactions.push(row);
    }

    if let Some(plan_id) = plan_id {
        let rows = transaction::Entity::find()
            .filter(transaction::Column::PlanId.eq(plan_id))
            .order_by_asc(transaction::Column::Month)
            .all(db)
            .await?;
        for row in into_transactions(rows)? {
            if !transactions.iter().any(|tx| tx.id == row.id) {
                transactions.push(row);
            }
        }
    }

    Ok(State::new(transactions))
}

/// Writes back the `touched` rows of `state`, all or nothing.
pub async fn persist(db: &DatabaseConnection, state: &State, touched: &[String]) -> Result<(), DbErr> {
    let changed_at = Utc::now();
    let txn = db.begin().await?;
    for id in touched {
        let Some(tx) = state.get(id) else {
            continue;
        };
        transaction::Entity::insert(active_model(tx, changed_at))
            .on_conflict(
                OnConflict::column(transaction::Column::Id)
                    .update_columns([
                        transaction::Column::Date,
                        transaction::Column::Month,
                        transaction::Column::Kind,
                        transaction::Column::Item,
                        transaction::Column::Category,
                        transaction::Column::Amount,
                        transaction::Column::IsFixed,
                        transaction::Column::PlanId,
                        transaction::Column::UpdatedAt,
                        transaction::Column::Deleted,
                        transaction::Column::ChangedAt,
                    ])
                    .to_owned(),
            )
            .exec(&txn)
            .await?;
    }
    txn.commit().await?;
    tracing::debug!(rows = touched.len(), "persisted touched rows");
    Ok(())
}

/// Bumps the change stamp of `id` without touching its content, so the
/// row is pulled again.
pub async fn mark_changed(db: &DatabaseConnection, id: &str) -> Result<(), DbErr> {
    transaction::Entity::update_many()
        .col_expr(transaction::Column::ChangedAt, Expr::value(Utc::now()))
        .filter(transaction::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

pub async fn initial_balance(db: &DatabaseConnection) -> Result<Option<InitialBalance>, DbErr> {
    let Some(row) = initial_balance::Entity::find_by_id(INITIAL_BALANCE_ROW)
        .one(db)
        .await?
    else {
        return Ok(None);
    };
    Ok(Some(InitialBalance {
        amount: parse_amount(&row.amount)?,
        date: row.date,
    }))
}

pub async fn set_initial_balance(db: &DatabaseConnection, value: &InitialBalance) -> Result<(), DbErr> {
    let row = initial_balance::ActiveModel {
        id: ActiveValue::Set(INITIAL_BALANCE_ROW),
        amount: ActiveValue::Set(value.amount.to_string()),
        date: ActiveValue::Set(value.date.clone()),
    };
    initial_balance::Entity::insert(row)
        .on_conflict(
            OnConflict::column(initial_balance::Column::Id)
                .update_columns([initial_balance::Column::Amount, initial_balance::Column::Date])
                .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}
