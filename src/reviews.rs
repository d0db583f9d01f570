//! Reviews of titles and comments on reviews.

use std::collections::HashMap;

use jiff::Timestamp;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, info};

use crate::{
    auth::{Identity, now_sec},
    entities::{comment, review, title, user},
    error::{AppError, AppResult, FieldErrors, unique_violation},
    models::{CommentPatch, CommentRead, CommentWrite, ReviewPatch, ReviewRead, ReviewWrite},
    pagination::{Page, PageQuery, fetch_page},
    permissions::{Action, Ownership, Resource, ensure},
    validation,
};

const DUPLICATE_REVIEW: &str = "you have already reviewed this title";

fn duplicate_review() -> AppError {
    AppError::validation("detail", DUPLICATE_REVIEW)
}

async fn ensure_title(db: &DatabaseConnection, title_id: i32) -> AppResult<()> {
    let exists = title::Entity::find_by_id(title_id).count(db).await? > 0;
    if exists { Ok(()) } else { Err(AppError::NotFound("title")) }
}

/// Looks a review up inside its title; a review of another title is absent.
async fn review_in_title(db: &DatabaseConnection, title_id: i32, review_id: i32) -> AppResult<review::Model> {
    ensure_title(db, title_id).await?;
    review::Entity::find_by_id(review_id)
        .filter(review::Column::TitleId.eq(title_id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("review"))
}

async fn comment_in_review(
    db: &DatabaseConnection,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
) -> AppResult<comment::Model> {
    review_in_title(db, title_id, review_id).await?;
    comment::Entity::find_by_id(comment_id)
        .filter(comment::Column::ReviewId.eq(review_id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("comment"))
}

async fn usernames(db: &DatabaseConnection, ids: impl IntoIterator<Item = i32>) -> AppResult<HashMap<i32, String>> {
    let ids: Vec<i32> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect())
}

fn review_read(model: review::Model, author: String) -> AppResult<ReviewRead> {
    Ok(ReviewRead {
        id: model.id,
        text: model.text,
        author,
        score: model.score,
        pub_date: Timestamp::from_second(model.pub_date)?,
    })
}

fn comment_read(model: comment::Model, author: String) -> AppResult<CommentRead> {
    Ok(CommentRead {
        id: model.id,
        text: model.text,
        author,
        pub_date: Timestamp::from_second(model.pub_date)?,
    })
}

// Reviews

pub async fn list_reviews(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    page: PageQuery,
    page_size: u64,
) -> AppResult<Page<ReviewRead>> {
    ensure(identity.role(), Resource::Review, Action::List, Ownership::NotOwner)?;
    ensure_title(db, title_id).await?;

    let select = review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .order_by_desc(review::Column::PubDate)
        .order_by_desc(review::Column::Id);
    let Page { count, next, previous, results } = fetch_page(select, db, page, page_size).await?;

    let authors = usernames(db, results.iter().map(|r| r.author_id)).await?;
    let results = results
        .into_iter()
        .map(|r| {
            let author = authors.get(&r.author_id).cloned().unwrap_or_default();
            review_read(r, author)
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Page { count, next, previous, results })
}

pub async fn get_review(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    review_id: i32,
) -> AppResult<ReviewRead> {
    ensure(identity.role(), Resource::Review, Action::Retrieve, Ownership::NotOwner)?;
    let model = review_in_title(db, title_id, review_id).await?;
    let author = usernames(db, [model.author_id]).await?.remove(&model.author_id).unwrap_or_default();
    review_read(model, author)
}

/// Creates the caller's review of a title. A second review by the same author
/// is a validation error, whether caught by the pre-check or by the unique
/// index when two requests race.
pub async fn create_review(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    body: ReviewWrite,
) -> AppResult<ReviewRead> {
    ensure(identity.role(), Resource::Review, Action::Create, Ownership::NotOwner)?;
    let author = identity.require_user()?;
    ensure_title(db, title_id).await?;

    let mut errors = FieldErrors::new();
    validation::bounded_text(&mut errors, "text", &body.text, validation::TEXT_MAX);
    validation::score(&mut errors, body.score);
    errors.into_result()?;

    let already = review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .filter(review::Column::AuthorId.eq(author.id))
        .count(db)
        .await?
        > 0;
    if already {
        return Err(duplicate_review());
    }

    let model = review::ActiveModel {
        title_id: Set(title_id),
        author_id: Set(author.id),
        text: Set(body.text),
        score: Set(body.score),
        pub_date: Set(now_sec()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(|err| {
        if unique_violation(&err) {
            debug!(title_id, author_id = author.id, "concurrent duplicate review rejected");
            duplicate_review()
        } else {
            err.into()
        }
    })?;

    info!(review_id = model.id, title_id, author_id = author.id, score = model.score, "review created");
    review_read(model, author.username.clone())
}

pub async fn update_review(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    review_id: i32,
    patch: ReviewPatch,
) -> AppResult<ReviewRead> {
    identity.require_user()?;
    let existing = review_in_title(db, title_id, review_id).await?;
    ensure(identity.role(), Resource::Review, Action::Update, identity.ownership(existing.author_id))?;

    let mut errors = FieldErrors::new();
    if let Some(text) = &patch.text {
        validation::bounded_text(&mut errors, "text", text, validation::TEXT_MAX);
    }
    if let Some(score) = patch.score {
        validation::score(&mut errors, score);
    }
    errors.into_result()?;

    let author_id = existing.author_id;
    let mut active: review::ActiveModel = existing.clone().into();
    if let Some(text) = patch.text {
        active.text = Set(text);
    }
    if let Some(score) = patch.score {
        active.score = Set(score);
    }
    let model = if active.is_changed() { active.update(db).await? } else { existing };

    info!(review_id, title_id, "review updated");
    let author = usernames(db, [author_id]).await?.remove(&author_id).unwrap_or_default();
    review_read(model, author)
}

pub async fn delete_review(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    review_id: i32,
) -> AppResult<()> {
    identity.require_user()?;
    let existing = review_in_title(db, title_id, review_id).await?;
    ensure(identity.role(), Resource::Review, Action::Delete, identity.ownership(existing.author_id))?;

    review::Entity::delete_by_id(existing.id).exec(db).await?;
    info!(review_id, title_id, "review deleted");
    Ok(())
}

// Comments

pub async fn list_comments(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    review_id: i32,
    page: PageQuery,
    page_size: u64,
) -> AppResult<Page<CommentRead>> {
    ensure(identity.role(), Resource::Comment, Action::List, Ownership::NotOwner)?;
    review_in_title(db, title_id, review_id).await?;

    let select = comment::Entity::find()
        .filter(comment::Column::ReviewId.eq(review_id))
        .order_by_desc(comment::Column::PubDate)
        .order_by_desc(comment::Column::Id);
    let Page { count, next, previous, results } = fetch_page(select, db, page, page_size).await?;

    let authors = usernames(db, results.iter().map(|c| c.author_id)).await?;
    let results = results
        .into_iter()
        .map(|c| {
            let author = authors.get(&c.author_id).cloned().unwrap_or_default();
            comment_read(c, author)
        })
        .collect::<AppResult<Vec<_>>>()?;
    Ok(Page { count, next, previous, results })
}

pub async fn get_comment(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
) -> AppResult<CommentRead> {
    ensure(identity.role(), Resource::Comment, Action::Retrieve, Ownership::NotOwner)?;
    let model = comment_in_review(db, title_id, review_id, comment_id).await?;
    let author = usernames(db, [model.author_id]).await?.remove(&model.author_id).unwrap_or_default();
    comment_read(model, author)
}

pub async fn create_comment(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    review_id: i32,
    body: CommentWrite,
) -> AppResult<CommentRead> {
    ensure(identity.role(), Resource::Comment, Action::Create, Ownership::NotOwner)?;
    let author = identity.require_user()?;
    review_in_title(db, title_id, review_id).await?;

    let mut errors = FieldErrors::new();
    validation::bounded_text(&mut errors, "text", &body.text, validation::TEXT_MAX);
    errors.into_result()?;

    let model = comment::ActiveModel {
        review_id: Set(review_id),
        author_id: Set(author.id),
        text: Set(body.text),
        pub_date: Set(now_sec()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(comment_id = model.id, review_id, author_id = author.id, "comment created");
    comment_read(model, author.username.clone())
}

pub async fn update_comment(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
    patch: CommentPatch,
) -> AppResult<CommentRead> {
    identity.require_user()?;
    let existing = comment_in_review(db, title_id, review_id, comment_id).await?;
    ensure(identity.role(), Resource::Comment, Action::Update, identity.ownership(existing.author_id))?;

    let mut errors = FieldErrors::new();
    if let Some(text) = &patch.text {
        validation::bounded_text(&mut errors, "text", text, validation::TEXT_MAX);
    }
    errors.into_result()?;

    let author_id = existing.author_id;
    let model = match patch.text {
        Some(text) => {
            let mut active: comment::ActiveModel = existing.into();
            active.text = Set(text);
            active.update(db).await?
        },
        None => existing,
    };

    info!(comment_id, review_id, "comment updated");
    let author = usernames(db, [author_id]).await?.remove(&author_id).unwrap_or_default();
    comment_read(model, author)
}

pub async fn delete_comment(
    db: &DatabaseConnection,
    identity: &Identity,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
) -> AppResult<()> {
    identity.require_user()?;
    let existing = comment_in_review(db, title_id, review_id, comment_id).await?;
    ensure(identity.role(), Resource::Comment, Action::Delete, identity.ownership(existing.author_id))?;

    comment::Entity::delete_by_id(existing.id).exec(db).await?;
    info!(comment_id, review_id, "comment deleted");
    Ok(())
}
