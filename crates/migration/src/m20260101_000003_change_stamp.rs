use sea_orm::ConnectionTrait;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Server clock of the last write to a row. Pulls resume from it, while
/// `updated_at` stays the device stamp used for conflicts.
#[derive(Iden)]
enum Transactions {
    Table,
    UpdatedAt,
    ChangedAt,
}

const INDEX: &str = "idx-transactions-changed_at";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(Transactions::Table)
                    .add_column(ColumnDef::new(Transactions::ChangedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();
        let backfill = Query::update()
            .table(Transactions::Table)
            .value(Transactions::ChangedAt, Expr::col(Transactions::UpdatedAt))
            .to_owned();
        db.execute(db.get_database_backend().build(&backfill)).await?;

        manager
            .create_index(
                Index::create()
                    .name(INDEX)
                    .table(Transactions::Table)
                    .col(Transactions::ChangedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name(INDEX).table(Transactions::Table).to_owned())
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Transactions::Table)
                    .drop_column(Transactions::ChangedAt)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
