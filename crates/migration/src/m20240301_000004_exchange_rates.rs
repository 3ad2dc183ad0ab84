use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ExchangeRates::Table)
                    .if_not_exists()
                    // `YYYY-MM-DD`, one row per day.
                    .col(
                        ColumnDef::new(ExchangeRates::Date)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ExchangeRates::BaseCurrency)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ExchangeRates::Rates).text().not_null())
                    .col(
                        ColumnDef::new(ExchangeRates::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ExchangeRates::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ExchangeRates {
    Table,
    Date,
    BaseCurrency,
    Rates,
    UpdatedAt,
}
