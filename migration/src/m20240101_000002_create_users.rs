use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len(Users::Username, 150).unique_key())
                    .col(string_len(Users::Email, 254).unique_key())
                    .col(string_len(Users::Role, 16).default("user"))
                    .col(string_len(Users::FirstName, 150).default(""))
                    .col(string_len(Users::LastName, 150).default(""))
                    .col(text(Users::Bio).default(""))
                    .col(boolean(Users::IsConfirmed).default(false))
                    .col(big_integer(Users::DateJoined))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EmailVerification::Table)
                    .if_not_exists()
                    .col(pk_auto(EmailVerification::Id))
                    .col(integer(EmailVerification::UserId).unique_key())
                    .col(string_len(EmailVerification::ConfirmationCode, 64))
                    .col(big_integer(EmailVerification::CreatedAt))
                    .col(big_integer(EmailVerification::ExpiresAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_email_verification_user")
                            .from(EmailVerification::Table, EmailVerification::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(EmailVerification::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Users::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Username,
    Email,
    Role,
    FirstName,
    LastName,
    Bio,
    IsConfirmed,
    DateJoined,
}

#[derive(DeriveIden)]
enum EmailVerification {
    Table,
    Id,
    UserId,
    ConfirmationCode,
    CreatedAt,
    ExpiresAt,
}
