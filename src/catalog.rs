//! Categories, genres and titles.
//!
//! Categories and genres are slug-addressed lookup tables; titles reference
//! one category and any number of genres by slug. Writes are admin-only,
//! reads are public.

use std::collections::HashMap;

use anyhow::anyhow;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use tracing::info;

use crate::{
    auth::Identity,
    entities::{category, genre, review, title, title_genre},
    error::{AppError, AppResult, FieldErrors, unique_violation},
    models::{LookupPatch, LookupRead, LookupWrite, SearchQuery, TitlePatch, TitleQuery, TitleRead, TitleWrite},
    pagination::{Page, fetch_page},
    permissions::{Action, Ownership, Resource, ensure},
    rating, validation,
};

fn slug_conflict(err: DbErr) -> AppError {
    if unique_violation(&err) {
        AppError::validation("slug", "an entry with this slug already exists")
    } else {
        err.into()
    }
}

fn validate_lookup(name: Option<&str>, slug: Option<&str>) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if let Some(name) = name {
        validation::bounded_text(&mut errors, "name", name, validation::NAME_MAX);
    }
    if let Some(slug) = slug {
        validation::slug(&mut errors, slug);
    }
    errors.into_result()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// Categories

pub async fn list_categories(
    db: &DatabaseConnection,
    identity: &Identity,
    query: &SearchQuery,
    page_size: u64,
) -> AppResult<Page<LookupRead>> {
    ensure(identity.role(), Resource::Category, Action::List, Ownership::NotOwner)?;

    let mut select = category::Entity::find()
        .order_by_asc(category::Column::Name)
        .order_by_asc(category::Column::Id);
    if let Some(search) = non_empty(&query.search) {
        select = select.filter(category::Column::Name.contains(search));
    }
    Ok(fetch_page(select, db, query.page(), page_size).await?.map(LookupRead::from))
}

pub async fn get_category(db: &DatabaseConnection, identity: &Identity, slug: &str) -> AppResult<LookupRead> {
    ensure(identity.role(), Resource::Category, Action::Retrieve, Ownership::NotOwner)?;
    category_by_slug(db, slug).await.map(LookupRead::from)
}

pub async fn create_category(
    db: &DatabaseConnection,
    identity: &Identity,
    body: LookupWrite,
) -> AppResult<LookupRead> {
    ensure(identity.role(), Resource::Category, Action::Create, Ownership::NotOwner)?;
    validate_lookup(Some(body.name.as_str()), Some(body.slug.as_str()))?;

    let model = category::ActiveModel { name: Set(body.name), slug: Set(body.slug), ..Default::default() }
        .insert(db)
        .await
        .map_err(slug_conflict)?;

    info!(slug = %model.slug, "category created");
    Ok(model.into())
}

pub async fn update_category(
    db: &DatabaseConnection,
    identity: &Identity,
    slug: &str,
    patch: LookupPatch,
) -> AppResult<LookupRead> {
    ensure(identity.role(), Resource::Category, Action::Update, Ownership::NotOwner)?;
    validate_lookup(patch.name.as_deref(), patch.slug.as_deref())?;

    let existing = category_by_slug(db, slug).await?;
    let mut active: category::ActiveModel = existing.clone().into();
    if let Some(name) = patch.name {
        active.name = Set(name);
    }
    if let Some(slug) = patch.slug {
        active.slug = Set(slug);
    }

    let model = if active.is_changed() {
        active.update(db).await.map_err(slug_conflict)?
    } else {
        existing
    };
    Ok(model.into())
}

/// Deleting a category also deletes every title filed under it.
pub async fn delete_category(db: &DatabaseConnection, identity: &Identity, slug: &str) -> AppResult<()> {
    ensure(identity.role(), Resource::Category, Action::Delete, Ownership::NotOwner)?;

    let res = category::Entity::delete_many().filter(category::Column::Slug.eq(slug)).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(AppError::NotFound("category"));
    }
    info!(slug, "category deleted");
    Ok(())
}

async fn category_by_slug(db: &DatabaseConnection, slug: &str) -> AppResult<category::Model> {
    category::Entity::find()
        .filter(category::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("category"))
}

// Genres

pub async fn list_genres(
    db: &DatabaseConnection,
    identity: &Identity,
    query: &SearchQuery,
    page_size: u64,
) -> AppResult<Page<LookupRead>> {
    ensure(identity.role(), Resource::Genre, Action::List, Ownership::NotOwner)?;

    let mut select =
        genre::Entity::find().order_by_asc(genre::Column::Name).order_by_asc(genre::Column::Id);
    if let Some(search) = non_empty(&query.search) {
        select = select.filter(genre::Column::Name.contains(search));
    }
    Ok(fetch_page(select, db, query.page(), page_size).await?.map(LookupRead::from))
}

pub async fn get_genre(db: &DatabaseConnection, identity: &Identity, slug: &str) -> AppResult<LookupRead> {
    ensure(identity.role(), Resource::Genre, Action::Retrieve, Ownership::NotOwner)?;
    genre_by_slug(db, slug).await.map(LookupRead::from)
}

pub async fn create_genre(db: &DatabaseConnection, identity: &Identity, body: LookupWrite) -> AppResult<LookupRead> {
    ensure(identity.role(), Resource::Genre, Action::Create, Ownership::NotOwner)?;
    validate_lookup(Some(body.name.as_str()), Some(body.slug.as_str()))?;

    let model = genre::ActiveModel { name: Set(body.name), slug: Set(body.slug), ..Default::default() }
        .insert(db)
        .await
        .map_err(slug_conflict)?;

    info!(slug = %model.slug, "genre created");
    Ok(model.into())
}

pub async fn update_genre(
    db: &DatabaseConnection,
    identity: &Identity,
    slug: &str,
    patch: LookupPatch,
) -> AppResult<LookupRead> {
    ensure(identity.role(), Resource::Genre, Action::Update, Ownership::NotOwner)?;
    validate_lookup(patch.name.as_deref(), patch.slug.as_deref())?;

    let existing = genre_by_slug(db, slug).await?;
    let mut active: genre::ActiveModel = existing.clone().into();
    if let Some(name) = patch.name {
        active.name = Set(name);
    }
    if let Some(slug) = patch.slug {
        active.slug = Set(slug);
    }

    let model = if active.is_changed() {
        active.update(db).await.map_err(slug_conflict)?
    } else {
        existing
    };
    Ok(model.into())
}

/// Titles keep existing; only their association with the genre goes away.
pub async fn delete_genre(db: &DatabaseConnection, identity: &Identity, slug: &str) -> AppResult<()> {
    ensure(identity.role(), Resource::Genre, Action::Delete, Ownership::NotOwner)?;

    let res = genre::Entity::delete_many().filter(genre::Column::Slug.eq(slug)).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(AppError::NotFound("genre"));
    }
    info!(slug, "genre deleted");
    Ok(())
}

async fn genre_by_slug(db: &DatabaseConnection, slug: &str) -> AppResult<genre::Model> {
    genre::Entity::find()
        .filter(genre::Column::Slug.eq(slug))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("genre"))
}

// Titles

pub async fn list_titles(
    db: &DatabaseConnection,
    identity: &Identity,
    query: &TitleQuery,
    page_size: u64,
) -> AppResult<Page<TitleRead>> {
    ensure(identity.role(), Resource::Title, Action::List, Ownership::NotOwner)?;

    let mut select =
        title::Entity::find().order_by_asc(title::Column::Name).order_by_asc(title::Column::Id);

    if let Some(name) = non_empty(&query.name) {
        select = select.filter(title::Column::Name.contains(name));
    }
    if let Some(year) = query.year {
        select = select.filter(title::Column::Year.eq(year));
    }
    if let Some(slug) = non_empty(&query.category) {
        let Some(category) =
            category::Entity::find().filter(category::Column::Slug.eq(slug)).one(db).await?
        else {
            return Ok(Page::empty());
        };
        select = select.filter(title::Column::CategoryId.eq(category.id));
    }
    if let Some(slug) = non_empty(&query.genre) {
        let Some(genre) = genre::Entity::find().filter(genre::Column::Slug.eq(slug)).one(db).await? else {
            return Ok(Page::empty());
        };
        let ids: Vec<i32> = title_genre::Entity::find()
            .select_only()
            .column(title_genre::Column::TitleId)
            .filter(title_genre::Column::GenreId.eq(genre.id))
            .into_tuple()
            .all(db)
            .await?;
        if ids.is_empty() {
            return Ok(Page::empty());
        }
        select = select.filter(title::Column::Id.is_in(ids));
    }

    let Page { count, next, previous, results } = fetch_page(select, db, query.page(), page_size).await?;
    Ok(Page { count, next, previous, results: expand_titles(db, results).await? })
}

pub async fn get_title(db: &DatabaseConnection, identity: &Identity, id: i32) -> AppResult<TitleRead> {
    ensure(identity.role(), Resource::Title, Action::Retrieve, Ownership::NotOwner)?;
    load_title(db, id).await
}

pub async fn create_title(db: &DatabaseConnection, identity: &Identity, body: TitleWrite) -> AppResult<TitleRead> {
    ensure(identity.role(), Resource::Title, Action::Create, Ownership::NotOwner)?;

    let mut errors = FieldErrors::new();
    validation::bounded_text(&mut errors, "name", &body.name, validation::NAME_MAX);
    validation::year(&mut errors, body.year, validation::current_year());
    if body.genre.is_empty() {
        errors.add("genre", "at least one genre is required");
    }
    let category = resolve_category(db, &body.category, &mut errors).await?;
    let genres = resolve_genres(db, &body.genre, &mut errors).await?;
    errors.into_result()?;
    let category = category.ok_or_else(|| anyhow!("category resolved without errors"))?;

    let txn = db.begin().await?;
    let model = title::ActiveModel {
        name: Set(body.name),
        year: Set(body.year),
        description: Set(body.description),
        category_id: Set(category.id),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    link_genres(&txn, model.id, &genres).await?;
    txn.commit().await?;

    info!(title_id = model.id, name = %model.name, "title created");
    load_title(db, model.id).await
}

pub async fn update_title(
    db: &DatabaseConnection,
    identity: &Identity,
    id: i32,
    patch: TitlePatch,
) -> AppResult<TitleRead> {
    ensure(identity.role(), Resource::Title, Action::Update, Ownership::NotOwner)?;
    let existing = title::Entity::find_by_id(id).one(db).await?.ok_or(AppError::NotFound("title"))?;

    let mut errors = FieldErrors::new();
    if let Some(name) = &patch.name {
        validation::bounded_text(&mut errors, "name", name, validation::NAME_MAX);
    }
    if let Some(year) = patch.year {
        validation::year(&mut errors, year, validation::current_year());
    }
    let category = match &patch.category {
        Some(slug) => resolve_category(db, slug, &mut errors).await?,
        None => None,
    };
    let genres = match &patch.genre {
        Some(slugs) if slugs.is_empty() => {
            errors.add("genre", "at least one genre is required");
            None
        },
        Some(slugs) => Some(resolve_genres(db, slugs, &mut errors).await?),
        None => None,
    };
    errors.into_result()?;

    let mut active: title::ActiveModel = existing.into();
    if let Some(name) = patch.name {
        active.name = Set(name);
    }
    if let Some(year) = patch.year {
        active.year = Set(year);
    }
    if let Some(description) = patch.description {
        active.description = Set(description);
    }
    if let Some(category) = category {
        active.category_id = Set(category.id);
    }

    let txn = db.begin().await?;
    if active.is_changed() {
        active.update(&txn).await?;
    }
    if let Some(genres) = genres {
        title_genre::Entity::delete_many()
            .filter(title_genre::Column::TitleId.eq(id))
            .exec(&txn)
            .await?;
        link_genres(&txn, id, &genres).await?;
    }
    txn.commit().await?;

    info!(title_id = id, "title updated");
    load_title(db, id).await
}

pub async fn delete_title(db: &DatabaseConnection, identity: &Identity, id: i32) -> AppResult<()> {
    ensure(identity.role(), Resource::Title, Action::Delete, Ownership::NotOwner)?;

    let res = title::Entity::delete_by_id(id).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(AppError::NotFound("title"));
    }
    info!(title_id = id, "title deleted");
    Ok(())
}

pub(crate) async fn load_title(db: &DatabaseConnection, id: i32) -> AppResult<TitleRead> {
    let model = title::Entity::find_by_id(id).one(db).await?.ok_or(AppError::NotFound("title"))?;
    expand_titles(db, vec![model])
        .await?
        .pop()
        .ok_or_else(|| anyhow!("title {id} vanished during expansion").into())
}

async fn resolve_category(
    db: &DatabaseConnection,
    slug: &str,
    errors: &mut FieldErrors,
) -> AppResult<Option<category::Model>> {
    let found = category::Entity::find().filter(category::Column::Slug.eq(slug)).one(db).await?;
    if found.is_none() {
        errors.add("category", format!("unknown category '{slug}'"));
    }
    Ok(found)
}

async fn resolve_genres(
    db: &DatabaseConnection,
    slugs: &[String],
    errors: &mut FieldErrors,
) -> AppResult<Vec<genre::Model>> {
    if slugs.is_empty() {
        return Ok(Vec::new());
    }
    let found = genre::Entity::find()
        .filter(genre::Column::Slug.is_in(slugs.iter().cloned()))
        .all(db)
        .await?;
    for slug in slugs {
        if !found.iter().any(|g| &g.slug == slug) {
            errors.add("genre", format!("unknown genre '{slug}'"));
        }
    }
    Ok(found)
}

async fn link_genres<C: sea_orm::ConnectionTrait>(conn: &C, title_id: i32, genres: &[genre::Model]) -> AppResult<()> {
    if genres.is_empty() {
        return Ok(());
    }
    let links = genres.iter().map(|g| title_genre::ActiveModel { title_id: Set(title_id), genre_id: Set(g.id) });
    title_genre::Entity::insert_many(links).exec_without_returning(conn).await?;
    Ok(())
}

/// Attaches category, genres and the rating derived from current review scores.
async fn expand_titles(db: &DatabaseConnection, titles: Vec<title::Model>) -> AppResult<Vec<TitleRead>> {
    if titles.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = titles.iter().map(|t| t.id).collect();
    let category_ids: Vec<i32> = titles.iter().map(|t| t.category_id).collect();

    let categories: HashMap<i32, category::Model> = category::Entity::find()
        .filter(category::Column::Id.is_in(category_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut genres: HashMap<i32, Vec<LookupRead>> = HashMap::new();
    let links = title_genre::Entity::find()
        .filter(title_genre::Column::TitleId.is_in(ids.clone()))
        .find_also_related(genre::Entity)
        .all(db)
        .await?;
    for (link, genre) in links {
        if let Some(genre) = genre {
            genres.entry(link.title_id).or_default().push(genre.into());
        }
    }

    let mut scores: HashMap<i32, Vec<i32>> = HashMap::new();
    let rows: Vec<(i32, i32)> = review::Entity::find()
        .select_only()
        .column(review::Column::TitleId)
        .column(review::Column::Score)
        .filter(review::Column::TitleId.is_in(ids))
        .into_tuple()
        .all(db)
        .await?;
    for (title_id, score) in rows {
        scores.entry(title_id).or_default().push(score);
    }

    titles
        .into_iter()
        .map(|t| -> AppResult<TitleRead> {
            let category = categories
                .get(&t.category_id)
                .cloned()
                .ok_or_else(|| anyhow!("title {} references missing category {}", t.id, t.category_id))?;
            let mut genre = genres.remove(&t.id).unwrap_or_default();
            genre.sort_by(|a, b| a.name.cmp(&b.name));
            let rating = rating::display_rating(scores.get(&t.id).map(Vec::as_slice).unwrap_or_default());
            Ok(TitleRead {
                id: t.id,
                name: t.name,
                year: t.year,
                rating,
                description: t.description,
                genre,
                category: category.into(),
            })
        })
        .collect()
}
