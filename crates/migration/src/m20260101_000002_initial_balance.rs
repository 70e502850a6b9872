use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Single-row table: the baseline the balance is computed from.
#[derive(Iden)]
enum InitialBalance {
    Table,
    Id,
    Amount,
    Date,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InitialBalance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InitialBalance::Id)
                            .integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(InitialBalance::Amount).string().not_null())
                    .col(ColumnDef::new(InitialBalance::Date).string().not_null())
                    .to_owned(),
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InitialBalance::Table).to_owned())
            .await?;
        Ok(())
    }
}
