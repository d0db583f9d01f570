//! Signup, confirmation code exchange and bearer token handling.

mod common;

use axum::http::StatusCode;
use common::spawn_app;
use reviewd::{
    accounts,
    entities::{
        email_verification,
        user::{self, Role},
    },
    models::Signup,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, sea_query::Expr};
use serde_json::json;

#[tokio::test]
async fn end_to_end_signup_review_and_permissions() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role("admin", Role::Admin).await;
    let title_id = app.seed_title(&admin).await;

    let (status, body) =
        app.post("/api/v1/auth/signup", None, json!({ "username": "bob", "email": "b@example.com" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "username": "bob", "email": "b@example.com" }));

    let code = app.code_for("b@example.com");
    let (status, body) =
        app.post("/api/v1/auth/token", None, json!({ "username": "bob", "confirmation_code": code })).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token string").to_string();

    let reviews = format!("/api/v1/titles/{title_id}/reviews");
    let (status, body) = app.post(&reviews, Some(&token), json!({ "text": "Too good", "score": 11 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["score"].is_array());

    let (status, body) = app.post(&reviews, Some(&token), json!({ "text": "Classic", "score": 9 })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author"], "bob");
    assert_eq!(body["score"], 9);
    assert!(body["pub_date"].is_string());

    let (status, _) = app.post(&reviews, Some(&token), json!({ "text": "Again", "score": 5 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete("/api/v1/categories/movie", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn reserved_username_is_rejected() {
    let app = spawn_app().await;
    let (status, body) =
        app.post("/api/v1/auth/signup", None, json!({ "username": "me", "email": "me@example.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());
    assert!(app.outbox.messages().is_empty());
}

#[tokio::test]
async fn signup_validates_shape() {
    let app = spawn_app().await;
    let (status, body) =
        app.post("/api/v1/auth/signup", None, json!({ "username": "bad name", "email": "nope" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array());
    assert!(body["email"].is_array());

    let (status, body) = app.post("/api/v1/auth/signup", None, json!({ "username": "bob" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_array());
}

#[tokio::test]
async fn signup_conflicts_with_other_pairing() {
    let app = spawn_app().await;
    let (status, _) =
        app.post("/api/v1/auth/signup", None, json!({ "username": "bob", "email": "b@example.com" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        app.post("/api/v1/auth/signup", None, json!({ "username": "bob", "email": "other@example.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"][0], "username or email already taken");

    let (status, _) =
        app.post("/api/v1/auth/signup", None, json!({ "username": "robert", "email": "b@example.com" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Same pair again is fine and re-sends a code.
    let (status, _) =
        app.post("/api/v1/auth/signup", None, json!({ "username": "bob", "email": "b@example.com" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.outbox.messages().len(), 2);
}

#[tokio::test]
async fn confirmation_code_is_single_use() {
    let app = spawn_app().await;
    app.post("/api/v1/auth/signup", None, json!({ "username": "bob", "email": "b@example.com" })).await;
    let code = app.code_for("b@example.com");

    let request = json!({ "username": "bob", "confirmation_code": code });
    let (status, _) = app.post("/api/v1/auth/token", None, request.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post("/api/v1/auth/token", None, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["confirmation_code"].is_array());
}

#[tokio::test]
async fn concurrent_identical_signups_share_one_user() {
    let app = spawn_app().await;
    let body = || Signup { username: "bob".to_string(), email: "b@example.com".to_string() };
    let (db, config) = (&app.state.db, app.state.config.as_ref());

    let (first, second) = tokio::join!(
        accounts::signup(db, app.outbox.as_ref(), config, body()),
        accounts::signup(db, app.outbox.as_ref(), config, body()),
    );
    assert_eq!(first.unwrap(), body());
    assert_eq!(second.unwrap(), body());

    let users = user::Entity::find().filter(user::Column::Username.eq("bob")).count(db).await.unwrap();
    assert_eq!(users, 1);

    let code = app.code_for("b@example.com");
    let (status, _) =
        app.post("/api/v1/auth/token", None, json!({ "username": "bob", "confirmation_code": code })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn repeated_signup_replaces_code() {
    let app = spawn_app().await;
    let signup = json!({ "username": "bob", "email": "b@example.com" });
    app.post("/api/v1/auth/signup", None, signup.clone()).await;
    let first = app.code_for("b@example.com");
    app.post("/api/v1/auth/signup", None, signup).await;
    let second = app.code_for("b@example.com");
    assert_ne!(first, second);

    let (status, _) =
        app.post("/api/v1/auth/token", None, json!({ "username": "bob", "confirmation_code": first })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) =
        app.post("/api/v1/auth/token", None, json!({ "username": "bob", "confirmation_code": second })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn token_exchange_errors() {
    let app = spawn_app().await;
    let (status, _) =
        app.post("/api/v1/auth/token", None, json!({ "username": "ghost", "confirmation_code": "x" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    app.post("/api/v1/auth/signup", None, json!({ "username": "bob", "email": "b@example.com" })).await;
    let (status, _) =
        app.post("/api/v1/auth/token", None, json!({ "username": "bob", "confirmation_code": "wrong" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) =
        app.post("/api/v1/auth/token", None, json!({ "username": "bob", "confirmation_code": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["confirmation_code"].is_array());
}

#[tokio::test]
async fn expired_code_is_rejected() {
    let app = spawn_app().await;
    app.post("/api/v1/auth/signup", None, json!({ "username": "bob", "email": "b@example.com" })).await;
    let code = app.code_for("b@example.com");

    email_verification::Entity::update_many()
        .col_expr(email_verification::Column::ExpiresAt, Expr::value(0i64))
        .filter(email_verification::Column::ConfirmationCode.eq(code.as_str()))
        .exec(&app.state.db)
        .await
        .unwrap();

    let (status, _) =
        app.post("/api/v1/auth/token", None, json!({ "username": "bob", "confirmation_code": code })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn exchange_marks_user_confirmed() {
    let app = spawn_app().await;
    app.post("/api/v1/auth/signup", None, json!({ "username": "bob", "email": "b@example.com" })).await;
    let code = app.code_for("b@example.com");
    let (_, body) =
        app.post("/api/v1/auth/token", None, json!({ "username": "bob", "confirmation_code": code })).await;
    let token = body["token"].as_str().unwrap();

    let claims = app.state.tokens.verify(token).unwrap();
    let user = reviewd::entities::user::Entity::find_by_id(claims.sub)
        .one(&app.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(user.is_confirmed);
    assert_eq!(user.role, Role::User);
}

#[tokio::test]
async fn bad_tokens_are_unauthorized() {
    let app = spawn_app().await;
    let (status, _) = app.get("/api/v1/users/me", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/v1/categories", Some("forged.signature")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (user, token) = app.user_with_role("temp", Role::User).await;
    let (_, admin) = app.user_with_role("admin", Role::Admin).await;
    let (status, _) = app.delete(&format!("/api/v1/users/{}", user.username), Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
