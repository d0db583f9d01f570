use sea_orm_migration::{prelude::*, schema::*};

use crate::{m20240101_000001_create_catalog::Title, m20240101_000002_create_users::Users};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Review::Table)
                    .if_not_exists()
                    .col(pk_auto(Review::Id))
                    .col(integer(Review::TitleId))
                    .col(integer(Review::AuthorId))
                    .col(string_len(Review::Text, 256))
                    .col(small_integer(Review::Score))
                    .col(big_integer(Review::PubDate))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_title")
                            .from(Review::Table, Review::TitleId)
                            .to(Title::Table, Title::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_review_author")
                            .from(Review::Table, Review::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One review per author per title; the application maps violations to 400s.
        manager
            .create_index(
                Index::create()
                    .name("idx_review_title_author_unique")
                    .table(Review::Table)
                    .col(Review::TitleId)
                    .col(Review::AuthorId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_review_pub_date")
                    .table(Review::Table)
                    .col(Review::PubDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comment::Table)
                    .if_not_exists()
                    .col(pk_auto(Comment::Id))
                    .col(integer(Comment::ReviewId))
                    .col(integer(Comment::AuthorId))
                    .col(string_len(Comment::Text, 256))
                    .col(big_integer(Comment::PubDate))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_review")
                            .from(Comment::Table, Comment::ReviewId)
                            .to(Review::Table, Review::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comment_author")
                            .from(Comment::Table, Comment::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_comment_review")
                    .table(Comment::Table)
                    .col(Comment::ReviewId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Comment::Table).to_owned()).await?;
        manager.drop_table(Table::drop().table(Review::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Review {
    Table,
    Id,
    TitleId,
    AuthorId,
    Text,
    Score,
    PubDate,
}

#[derive(DeriveIden)]
enum Comment {
    Table,
    Id,
    ReviewId,
    AuthorId,
    Text,
    PubDate,
}
