//! Create `manufacture` table.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Manufacture::Table)
                    .if_not_exists()
                    .col(uuid(Manufacture::Id).primary_key())
                    .col(string_len(Manufacture::Name, 128).unique_key())
                    .col(text_null(Manufacture::Description))
                    .col(string_len_null(Manufacture::Founder, 128))
                    .col(string_len_null(Manufacture::Director, 128))
                    .col(string_len_null(Manufacture::Website, 255))
                    .col(string_len_null(Manufacture::Image, 255))
                    .col(timestamp_with_time_zone(Manufacture::CreatedAt))
                    .col(timestamp_with_time_zone(Manufacture::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Manufacture::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Manufacture { Table, Id, Name, Description, Founder, Director, Website, Image, CreatedAt, UpdatedAt }
