use std::sync::Arc;

use axum::{extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::{
    AppState, accounts,
    auth::Identity,
    catalog,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    models::{
        CommentPatch, CommentRead, CommentWrite, LookupPatch, LookupRead, LookupWrite, ReviewPatch, ReviewRead,
        ReviewWrite, SearchQuery, Signup, TitlePatch, TitleQuery, TitleRead, TitleWrite, TokenRequest,
        TokenResponse, UserCreate, UserPatch, UserRead,
    },
    pagination::{Page, PageQuery},
    permissions::{Action, Ownership, Resource, ensure},
    reviews,
};

type AppStateRef = State<Arc<AppState>>;

/// A JSON body whose rejection is held back until the caller is authorized.
type Body<T> = Result<Json<T>, AppError>;

/// Role-level permission for a write, checked before any body error
/// surfaces. Ownership rules run again once the record is loaded.
fn authorized<T>(
    identity: &Identity,
    resource: Resource,
    action: Action,
    ownership: Ownership,
    body: Body<T>,
) -> AppResult<T> {
    ensure(identity.role(), resource, action, ownership)?;
    body.map(|Json(body)| body)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// Auth

pub async fn signup(State(state): AppStateRef, Json(body): Json<Signup>) -> AppResult<Json<Signup>> {
    accounts::signup(&state.db, state.mailer.as_ref(), &state.config, body).await.map(Json)
}

pub async fn token(State(state): AppStateRef, Json(body): Json<TokenRequest>) -> AppResult<Json<TokenResponse>> {
    accounts::obtain_token(&state.db, &state.tokens, body).await.map(Json)
}

// Categories

pub async fn list_categories(
    State(state): AppStateRef,
    identity: Identity,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Page<LookupRead>>> {
    catalog::list_categories(&state.db, &identity, &query, state.config.page_size).await.map(Json)
}

pub async fn get_category(
    State(state): AppStateRef,
    identity: Identity,
    Path(slug): Path<String>,
) -> AppResult<Json<LookupRead>> {
    catalog::get_category(&state.db, &identity, &slug).await.map(Json)
}

pub async fn create_category(
    State(state): AppStateRef,
    identity: Identity,
    body: Body<LookupWrite>,
) -> AppResult<(StatusCode, Json<LookupRead>)> {
    let body = authorized(&identity, Resource::Category, Action::Create, Ownership::NotOwner, body)?;
    let created = catalog::create_category(&state.db, &identity, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_category(
    State(state): AppStateRef,
    identity: Identity,
    Path(slug): Path<String>,
    patch: Body<LookupPatch>,
) -> AppResult<Json<LookupRead>> {
    let patch = authorized(&identity, Resource::Category, Action::Update, Ownership::NotOwner, patch)?;
    catalog::update_category(&state.db, &identity, &slug, patch).await.map(Json)
}

pub async fn delete_category(
    State(state): AppStateRef,
    identity: Identity,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    catalog::delete_category(&state.db, &identity, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Genres

pub async fn list_genres(
    State(state): AppStateRef,
    identity: Identity,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Page<LookupRead>>> {
    catalog::list_genres(&state.db, &identity, &query, state.config.page_size).await.map(Json)
}

pub async fn get_genre(
    State(state): AppStateRef,
    identity: Identity,
    Path(slug): Path<String>,
) -> AppResult<Json<LookupRead>> {
    catalog::get_genre(&state.db, &identity, &slug).await.map(Json)
}

pub async fn create_genre(
    State(state): AppStateRef,
    identity: Identity,
    body: Body<LookupWrite>,
) -> AppResult<(StatusCode, Json<LookupRead>)> {
    let body = authorized(&identity, Resource::Genre, Action::Create, Ownership::NotOwner, body)?;
    let created = catalog::create_genre(&state.db, &identity, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_genre(
    State(state): AppStateRef,
    identity: Identity,
    Path(slug): Path<String>,
    patch: Body<LookupPatch>,
) -> AppResult<Json<LookupRead>> {
    let patch = authorized(&identity, Resource::Genre, Action::Update, Ownership::NotOwner, patch)?;
    catalog::update_genre(&state.db, &identity, &slug, patch).await.map(Json)
}

pub async fn delete_genre(
    State(state): AppStateRef,
    identity: Identity,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    catalog::delete_genre(&state.db, &identity, &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Titles

pub async fn list_titles(
    State(state): AppStateRef,
    identity: Identity,
    Query(query): Query<TitleQuery>,
) -> AppResult<Json<Page<TitleRead>>> {
    catalog::list_titles(&state.db, &identity, &query, state.config.page_size).await.map(Json)
}

pub async fn get_title(
    State(state): AppStateRef,
    identity: Identity,
    Path(title_id): Path<i32>,
) -> AppResult<Json<TitleRead>> {
    catalog::get_title(&state.db, &identity, title_id).await.map(Json)
}

pub async fn create_title(
    State(state): AppStateRef,
    identity: Identity,
    body: Body<TitleWrite>,
) -> AppResult<(StatusCode, Json<TitleRead>)> {
    let body = authorized(&identity, Resource::Title, Action::Create, Ownership::NotOwner, body)?;
    let created = catalog::create_title(&state.db, &identity, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_title(
    State(state): AppStateRef,
    identity: Identity,
    Path(title_id): Path<i32>,
    patch: Body<TitlePatch>,
) -> AppResult<Json<TitleRead>> {
    let patch = authorized(&identity, Resource::Title, Action::Update, Ownership::NotOwner, patch)?;
    catalog::update_title(&state.db, &identity, title_id, patch).await.map(Json)
}

pub async fn delete_title(
    State(state): AppStateRef,
    identity: Identity,
    Path(title_id): Path<i32>,
) -> AppResult<StatusCode> {
    catalog::delete_title(&state.db, &identity, title_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Reviews

pub async fn list_reviews(
    State(state): AppStateRef,
    identity: Identity,
    Path(title_id): Path<i32>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<ReviewRead>>> {
    reviews::list_reviews(&state.db, &identity, title_id, page, state.config.page_size).await.map(Json)
}

pub async fn get_review(
    State(state): AppStateRef,
    identity: Identity,
    Path((title_id, review_id)): Path<(i32, i32)>,
) -> AppResult<Json<ReviewRead>> {
    reviews::get_review(&state.db, &identity, title_id, review_id).await.map(Json)
}

pub async fn create_review(
    State(state): AppStateRef,
    identity: Identity,
    Path(title_id): Path<i32>,
    body: Body<ReviewWrite>,
) -> AppResult<(StatusCode, Json<ReviewRead>)> {
    let body = authorized(&identity, Resource::Review, Action::Create, Ownership::NotOwner, body)?;
    let created = reviews::create_review(&state.db, &identity, title_id, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_review(
    State(state): AppStateRef,
    identity: Identity,
    Path((title_id, review_id)): Path<(i32, i32)>,
    patch: Body<ReviewPatch>,
) -> AppResult<Json<ReviewRead>> {
    let patch = authorized(&identity, Resource::Review, Action::Update, Ownership::Owner, patch)?;
    reviews::update_review(&state.db, &identity, title_id, review_id, patch).await.map(Json)
}

pub async fn delete_review(
    State(state): AppStateRef,
    identity: Identity,
    Path((title_id, review_id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    reviews::delete_review(&state.db, &identity, title_id, review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Comments

pub async fn list_comments(
    State(state): AppStateRef,
    identity: Identity,
    Path((title_id, review_id)): Path<(i32, i32)>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<Page<CommentRead>>> {
    reviews::list_comments(&state.db, &identity, title_id, review_id, page, state.config.page_size)
        .await
        .map(Json)
}

pub async fn get_comment(
    State(state): AppStateRef,
    identity: Identity,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
) -> AppResult<Json<CommentRead>> {
    reviews::get_comment(&state.db, &identity, title_id, review_id, comment_id).await.map(Json)
}

pub async fn create_comment(
    State(state): AppStateRef,
    identity: Identity,
    Path((title_id, review_id)): Path<(i32, i32)>,
    body: Body<CommentWrite>,
) -> AppResult<(StatusCode, Json<CommentRead>)> {
    let body = authorized(&identity, Resource::Comment, Action::Create, Ownership::NotOwner, body)?;
    let created = reviews::create_comment(&state.db, &identity, title_id, review_id, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_comment(
    State(state): AppStateRef,
    identity: Identity,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    patch: Body<CommentPatch>,
) -> AppResult<Json<CommentRead>> {
    let patch = authorized(&identity, Resource::Comment, Action::Update, Ownership::Owner, patch)?;
    reviews::update_comment(&state.db, &identity, title_id, review_id, comment_id, patch).await.map(Json)
}

pub async fn delete_comment(
    State(state): AppStateRef,
    identity: Identity,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
) -> AppResult<StatusCode> {
    reviews::delete_comment(&state.db, &identity, title_id, review_id, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Users

pub async fn me(identity: Identity) -> AppResult<Json<UserRead>> {
    accounts::me(&identity).map(Json)
}

pub async fn update_me(
    State(state): AppStateRef,
    identity: Identity,
    patch: Body<UserPatch>,
) -> AppResult<Json<UserRead>> {
    let patch = authorized(&identity, Resource::User, Action::Update, Ownership::Owner, patch)?;
    accounts::update_me(&state.db, &identity, patch).await.map(Json)
}

pub async fn list_users(
    State(state): AppStateRef,
    identity: Identity,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Page<UserRead>>> {
    accounts::list_users(&state.db, &identity, &query, state.config.page_size).await.map(Json)
}

pub async fn create_user(
    State(state): AppStateRef,
    identity: Identity,
    body: Body<UserCreate>,
) -> AppResult<(StatusCode, Json<UserRead>)> {
    let body = authorized(&identity, Resource::User, Action::Create, Ownership::NotOwner, body)?;
    let created = accounts::create_user(&state.db, &identity, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_user(
    State(state): AppStateRef,
    identity: Identity,
    Path(username): Path<String>,
) -> AppResult<Json<UserRead>> {
    accounts::get_user(&state.db, &identity, &username).await.map(Json)
}

pub async fn update_user(
    State(state): AppStateRef,
    identity: Identity,
    Path(username): Path<String>,
    patch: Body<UserPatch>,
) -> AppResult<Json<UserRead>> {
    let patch = authorized(&identity, Resource::User, Action::Update, Ownership::NotOwner, patch)?;
    accounts::update_user(&state.db, &identity, &username, patch).await.map(Json)
}

pub async fn delete_user(
    State(state): AppStateRef,
    identity: Identity,
    Path(username): Path<String>,
) -> AppResult<StatusCode> {
    accounts::delete_user(&state.db, &identity, &username).await?;
    Ok(StatusCode::NO_CONTENT)
}
