//! Create `car` table with an optional FK to `manufacture`.
//!
//! Image references are kept in order as a JSONB array of file names.
//! The FK restricts deletes so a manufacturer with cars cannot vanish.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Car::Table)
                    .if_not_exists()
                    .col(uuid(Car::Id).primary_key())
                    .col(string_len(Car::Brand, 128))
                    .col(string_len(Car::Model, 128))
                    .col(integer(Car::Year))
                    .col(double(Car::Price))
                    .col(string_len(Car::Color, 64))
                    .col(string_len(Car::Gearbox, 64))
                    .col(uuid_null(Car::ManufactureId))
                    .col(json_binary(Car::Images))
                    .col(timestamp_with_time_zone(Car::CreatedAt))
                    .col(timestamp_with_time_zone(Car::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_car_manufacture")
                            .from(Car::Table, Car::ManufactureId)
                            .to(Manufacture::Table, Manufacture::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Car::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Car { Table, Id, Brand, Model, Year, Price, Color, Gearbox, ManufactureId, Images, CreatedAt, UpdatedAt }

#[derive(DeriveIden)]
enum Manufacture { Table, Id }
