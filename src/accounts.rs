//! Signup, confirmation-code exchange and user management.
//!
//! A user moves from unconfirmed to confirmed the first time a confirmation
//! code is exchanged for a token. Codes are single use: the exchange deletes
//! the row, so two concurrent exchanges of one code cannot both succeed.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};
use tracing::{debug, info, warn};

use crate::{
    auth::{Identity, TokenSigner, generate_confirmation_code, now_sec},
    config::Config,
    entities::{
        email_verification,
        user::{self, Role},
    },
    error::{AppError, AppResult, FieldErrors, unique_violation},
    mailer::{Mailer, confirmation_email},
    models::{SearchQuery, Signup, TokenRequest, TokenResponse, UserCreate, UserPatch, UserRead},
    pagination::{Page, fetch_page},
    permissions::{Action, Ownership, Resource, can_change_role, ensure},
    validation,
};

fn taken() -> AppError {
    AppError::validation("detail", "username or email already taken")
}

fn identity_conflict(err: DbErr) -> AppError {
    if unique_violation(&err) { taken() } else { err.into() }
}

/// Registers (or re-registers) `username`/`email` and mails a fresh code.
pub async fn signup(db: &DatabaseConnection, mailer: &dyn Mailer, config: &Config, body: Signup) -> AppResult<Signup> {
    let mut errors = FieldErrors::new();
    validation::username(&mut errors, &body.username);
    validation::email(&mut errors, &body.email);
    errors.into_result()?;

    let user = find_or_create_pending(db, &body.username, &body.email).await?;

    let code = generate_confirmation_code();
    let now = now_sec();
    let verification = email_verification::ActiveModel {
        user_id: Set(user.id),
        confirmation_code: Set(code.clone()),
        created_at: Set(now),
        expires_at: Set(now.saturating_add(config.confirmation_code_ttl_minutes.saturating_mul(60))),
        ..Default::default()
    };
    email_verification::Entity::insert(verification)
        .on_conflict(
            OnConflict::column(email_verification::Column::UserId)
                .update_columns([
                    email_verification::Column::ConfirmationCode,
                    email_verification::Column::CreatedAt,
                    email_verification::Column::ExpiresAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    let message = confirmation_email(&config.email_from, &user.email, &code);
    if let Err(err) = mailer.send(&message) {
        warn!(user_id = user.id, error = %err, "failed to deliver confirmation code");
    }

    info!(user_id = user.id, username = %user.username, "confirmation code issued");
    Ok(Signup { username: user.username, email: user.email })
}

async fn find_or_create_pending(db: &DatabaseConnection, username: &str, email: &str) -> AppResult<user::Model> {
    let matches = user::Entity::find()
        .filter(Condition::any().add(user::Column::Username.eq(username)).add(user::Column::Email.eq(email)))
        .all(db)
        .await?;

    if let Some(user) = matches.iter().find(|u| u.username == username && u.email == email) {
        return Ok(user.clone());
    }
    if !matches.is_empty() {
        debug!(username, "signup collides with another account");
        return Err(taken());
    }

    let inserted = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        role: Set(Role::User),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        bio: Set(String::new()),
        is_confirmed: Set(false),
        date_joined: Set(now_sec()),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(user) => Ok(user),
        // A concurrent signup for the same pair won the insert.
        Err(err) if unique_violation(&err) => user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .filter(user::Column::Email.eq(email))
            .one(db)
            .await?
            .ok_or_else(taken),
        Err(err) => Err(err.into()),
    }
}

/// Exchanges a confirmation code for a bearer token, consuming the code.
pub async fn obtain_token(db: &DatabaseConnection, tokens: &TokenSigner, body: TokenRequest) -> AppResult<TokenResponse> {
    let mut errors = FieldErrors::new();
    if body.username.trim().is_empty() {
        errors.add("username", "this field may not be blank");
    }
    if body.confirmation_code.trim().is_empty() {
        errors.add("confirmation_code", "this field may not be blank");
    }
    errors.into_result()?;

    let user = user::Entity::find()
        .filter(user::Column::Username.eq(body.username.as_str()))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let consumed = email_verification::Entity::delete_many()
        .filter(email_verification::Column::UserId.eq(user.id))
        .filter(email_verification::Column::ConfirmationCode.eq(body.confirmation_code.as_str()))
        .filter(email_verification::Column::ExpiresAt.gte(now_sec()))
        .exec(db)
        .await?
        .rows_affected;
    if consumed == 0 {
        debug!(user_id = user.id, "confirmation code rejected");
        return Err(AppError::validation("confirmation_code", "invalid or expired confirmation code"));
    }

    let user = if user.is_confirmed {
        user
    } else {
        let mut active: user::ActiveModel = user.into();
        active.is_confirmed = Set(true);
        active.update(db).await?
    };

    let token = tokens.issue(&user)?;
    info!(user_id = user.id, "access token issued");
    Ok(TokenResponse { token })
}

// Profiles

pub fn me(identity: &Identity) -> AppResult<UserRead> {
    ensure(identity.role(), Resource::User, Action::Retrieve, Ownership::Owner)?;
    Ok(identity.require_user()?.clone().into())
}

pub async fn update_me(db: &DatabaseConnection, identity: &Identity, patch: UserPatch) -> AppResult<UserRead> {
    ensure(identity.role(), Resource::User, Action::Update, Ownership::Owner)?;
    let user = identity.require_user()?.clone();
    apply_patch(db, identity.role(), user, patch).await.map(UserRead::from)
}

pub async fn list_users(
    db: &DatabaseConnection,
    identity: &Identity,
    query: &SearchQuery,
    page_size: u64,
) -> AppResult<Page<UserRead>> {
    ensure(identity.role(), Resource::User, Action::List, Ownership::NotOwner)?;

    let mut select = user::Entity::find().order_by_asc(user::Column::Username);
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        select = select.filter(user::Column::Username.contains(search));
    }
    Ok(fetch_page(select, db, query.page(), page_size).await?.map(UserRead::from))
}

pub async fn create_user(db: &DatabaseConnection, identity: &Identity, body: UserCreate) -> AppResult<UserRead> {
    ensure(identity.role(), Resource::User, Action::Create, Ownership::NotOwner)?;

    let mut errors = FieldErrors::new();
    validation::username(&mut errors, &body.username);
    validation::email(&mut errors, &body.email);
    validation::optional_text(&mut errors, "first_name", &body.first_name, validation::PERSON_NAME_MAX);
    validation::optional_text(&mut errors, "last_name", &body.last_name, validation::PERSON_NAME_MAX);
    errors.into_result()?;

    let model = user::ActiveModel {
        username: Set(body.username),
        email: Set(body.email),
        role: Set(body.role.unwrap_or(Role::User)),
        first_name: Set(body.first_name),
        last_name: Set(body.last_name),
        bio: Set(body.bio),
        is_confirmed: Set(false),
        date_joined: Set(now_sec()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(identity_conflict)?;

    info!(user_id = model.id, role = ?model.role, "user created by admin");
    Ok(model.into())
}

pub async fn get_user(db: &DatabaseConnection, identity: &Identity, username: &str) -> AppResult<UserRead> {
    ensure(identity.role(), Resource::User, Action::Retrieve, Ownership::NotOwner)?;
    user_by_username(db, username).await.map(UserRead::from)
}

pub async fn update_user(
    db: &DatabaseConnection,
    identity: &Identity,
    username: &str,
    patch: UserPatch,
) -> AppResult<UserRead> {
    ensure(identity.role(), Resource::User, Action::Update, Ownership::NotOwner)?;
    let user = user_by_username(db, username).await?;
    apply_patch(db, identity.role(), user, patch).await.map(UserRead::from)
}

pub async fn delete_user(db: &DatabaseConnection, identity: &Identity, username: &str) -> AppResult<()> {
    ensure(identity.role(), Resource::User, Action::Delete, Ownership::NotOwner)?;

    let res = user::Entity::delete_many().filter(user::Column::Username.eq(username)).exec(db).await?;
    if res.rows_affected == 0 {
        return Err(AppError::NotFound("user"));
    }
    info!(username, "user deleted");
    Ok(())
}

async fn user_by_username(db: &DatabaseConnection, username: &str) -> AppResult<user::Model> {
    user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("user"))
}

/// Applies a profile patch on behalf of `actor`. A `role` from a non-admin is
/// dropped without error.
async fn apply_patch(
    db: &DatabaseConnection,
    actor: Option<Role>,
    target: user::Model,
    patch: UserPatch,
) -> AppResult<user::Model> {
    let mut errors = FieldErrors::new();
    if let Some(username) = &patch.username {
        validation::username(&mut errors, username);
    }
    if let Some(email) = &patch.email {
        validation::email(&mut errors, email);
    }
    if let Some(first_name) = &patch.first_name {
        validation::optional_text(&mut errors, "first_name", first_name, validation::PERSON_NAME_MAX);
    }
    if let Some(last_name) = &patch.last_name {
        validation::optional_text(&mut errors, "last_name", last_name, validation::PERSON_NAME_MAX);
    }
    errors.into_result()?;

    let target_id = target.id;
    let mut active: user::ActiveModel = target.clone().into();
    if let Some(username) = patch.username {
        active.username = Set(username);
    }
    if let Some(email) = patch.email {
        active.email = Set(email);
    }
    if let Some(first_name) = patch.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = patch.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(bio) = patch.bio {
        active.bio = Set(bio);
    }
    match patch.role {
        Some(role) if can_change_role(actor) => active.role = Set(role),
        Some(_) => debug!(user_id = target_id, "role change ignored for non-admin"),
        None => {},
    }

    if !active.is_changed() {
        return Ok(target);
    }
    let model = active.update(db).await.map_err(identity_conflict)?;
    info!(user_id = model.id, "user profile updated");
    Ok(model)
}
