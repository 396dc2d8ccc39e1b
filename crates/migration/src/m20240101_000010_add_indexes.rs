use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Car: lookups by manufacturer (list filter + restrict check)
        manager
            .create_index(
                Index::create()
                    .name("idx_car_manufacture")
                    .table(Car::Table)
                    .col(Car::ManufactureId)
                    .to_owned(),
            )
            .await?;

        // Car: stable listing order
        manager
            .create_index(
                Index::create()
                    .name("idx_car_created_id")
                    .table(Car::Table)
                    .col(Car::CreatedAt)
                    .col(Car::Id)
                    .to_owned(),
            )
            .await?;

        // UserRole: reverse lookup for the role restrict check
        manager
            .create_index(
                Index::create()
                    .name("idx_user_role_role")
                    .table(UserRole::Table)
                    .col(UserRole::RoleId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_index(Index::drop().name("idx_user_role_role").table(UserRole::Table).to_owned()).await?;
        manager.drop_index(Index::drop().name("idx_car_created_id").table(Car::Table).to_owned()).await?;
        manager.drop_index(Index::drop().name("idx_car_manufacture").table(Car::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Car { Table, Id, ManufactureId, CreatedAt }

#[derive(DeriveIden)]
enum UserRole { Table, RoleId }
