use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Categories::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Categories::Name).string().not_null())
                    .col(ColumnDef::new(Categories::Icon).string())
                    .col(ColumnDef::new(Categories::ParentId).string())
                    .col(ColumnDef::new(Categories::Path).text().not_null())
                    .col(ColumnDef::new(Categories::Level).integer().not_null())
                    .col(
                        ColumnDef::new(Categories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Categories::CreatedBy).string().not_null())
                    .col(ColumnDef::new(Categories::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Categories::UpdatedBy).string())
                    .to_owned(),
            )
            .await?;

        // Prefix matches on the materialized path.
        manager
            .create_index(
                Index::create()
                    .name("idx-categories-path")
                    .table(Categories::Table)
                    .col(Categories::Path)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-categories-parent_id")
                    .table(Categories::Table)
                    .col(Categories::ParentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum Categories {
    Table,
    Id,
    Name,
    Icon,
    ParentId,
    Path,
    Level,
    CreatedAt,
    CreatedBy,
    UpdatedAt,
    UpdatedBy,
}
