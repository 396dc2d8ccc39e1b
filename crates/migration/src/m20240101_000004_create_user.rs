//! Create `app_user` table.
//!
//! Email and user name are unique; the password is stored as an argon2 PHC string.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AppUser::Table)
                    .if_not_exists()
                    .col(uuid(AppUser::Id).primary_key())
                    .col(string_len(AppUser::Email, 255).unique_key())
                    .col(string_len(AppUser::UserName, 128).unique_key())
                    .col(string_len(AppUser::FirstName, 128))
                    .col(string_len(AppUser::LastName, 128))
                    .col(string_len(AppUser::PasswordHash, 255))
                    .col(boolean(AppUser::EmailConfirmed))
                    .col(string_len_null(AppUser::Image, 255))
                    .col(timestamp_with_time_zone(AppUser::CreatedAt))
                    .col(timestamp_with_time_zone(AppUser::UpdatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(AppUser::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum AppUser { Table, Id, Email, UserName, FirstName, LastName, PasswordHash, EmailConfirmed, Image, CreatedAt, UpdatedAt }
