//! Reviews, comments and the derived title rating.

mod common;

use axum::http::StatusCode;
use common::spawn_app;
use reviewd::{
    auth::Identity,
    entities::{review, user::Role},
    error::AppError,
    models::ReviewWrite,
    reviews,
};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

#[tokio::test]
async fn rating_tracks_reviews() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role("admin", Role::Admin).await;
    let (_, alice) = app.user_with_role("alice", Role::User).await;
    let (_, bob) = app.user_with_role("bob", Role::User).await;
    let title_id = app.seed_title(&admin).await;
    let title = format!("/api/v1/titles/{title_id}");
    let reviews = format!("{title}/reviews");

    let (_, body) = app.get(&title, None).await;
    assert!(body["rating"].is_null());

    let (_, created) = app.post(&reviews, Some(&alice), json!({ "text": "Fine", "score": 6 })).await;
    let (_, body) = app.get(&title, None).await;
    assert_eq!(body["rating"], 6);

    app.post(&reviews, Some(&bob), json!({ "text": "Great", "score": 10 })).await;
    let (_, body) = app.get(&title, None).await;
    assert_eq!(body["rating"], 8);

    let review_id = created["id"].as_i64().unwrap();
    let (status, _) =
        app.patch(&format!("{reviews}/{review_id}"), Some(&alice), json!({ "score": 2 })).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.get(&title, None).await;
    assert_eq!(body["rating"], 6);

    let (status, _) = app.delete(&format!("{reviews}/{review_id}"), Some(&alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = app.get(&title, None).await;
    assert_eq!(body["rating"], 10);

    let (_, list) = app.get("/api/v1/titles", None).await;
    assert_eq!(list["results"][0]["rating"], 10);
}

#[tokio::test]
async fn only_author_or_staff_edit_reviews() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role("admin", Role::Admin).await;
    let (_, alice) = app.user_with_role("alice", Role::User).await;
    let (_, bob) = app.user_with_role("bob", Role::User).await;
    let (_, moderator) = app.user_with_role("mod", Role::Moderator).await;
    let title_id = app.seed_title(&admin).await;
    let reviews = format!("/api/v1/titles/{title_id}/reviews");

    let (_, created) = app.post(&reviews, Some(&alice), json!({ "text": "Mine", "score": 7 })).await;
    let review = format!("{reviews}/{}", created["id"]);

    let (status, _) = app.patch(&review, Some(&bob), json!({ "text": "Hijacked" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&review, Some(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.patch(&review, None, json!({ "text": "Anon" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.patch(&review, Some(&alice), json!({ "text": "Still mine" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Still mine");
    assert_eq!(body["score"], 7);
    assert_eq!(body["pub_date"], created["pub_date"]);

    let (status, _) = app.patch(&review, Some(&moderator), json!({ "text": "Moderated" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.patch(&review, Some(&alice), json!({ "score": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&review, Some(&moderator)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&review, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn review_on_missing_title() {
    let app = spawn_app().await;
    let (_, alice) = app.user_with_role("alice", Role::User).await;
    let (status, _) =
        app.post("/api/v1/titles/404/reviews", Some(&alice), json!({ "text": "Hm", "score": 5 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_duplicate_reviews_store_one_row() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role("admin", Role::Admin).await;
    let (alice, _) = app.user_with_role("alice", Role::User).await;
    let title_id = app.seed_title(&admin).await as i32;
    let identity = Identity::User(alice.clone());
    let db = &app.state.db;

    let body = || ReviewWrite { text: "Racing".to_string(), score: 8 };
    let (first, second) = tokio::join!(
        reviews::create_review(db, &identity, title_id, body()),
        reviews::create_review(db, &identity, title_id, body()),
    );

    let outcomes = [first, second];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes.iter().any(|r| matches!(r, Err(AppError::Validation(_)))));

    let stored = review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .filter(review::Column::AuthorId.eq(alice.id))
        .count(db)
        .await
        .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn comments_belong_to_review_in_title() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role("admin", Role::Admin).await;
    let (_, alice) = app.user_with_role("alice", Role::User).await;
    let (_, bob) = app.user_with_role("bob", Role::User).await;
    let title_id = app.seed_title(&admin).await;
    let (_, other) = app
        .post(
            "/api/v1/titles",
            Some(&admin),
            json!({ "name": "Heat", "year": 1995, "category": "movie", "genre": ["drama"] }),
        )
        .await;
    let other_id = other["id"].as_i64().unwrap();

    let (_, review) =
        app.post(&format!("/api/v1/titles/{title_id}/reviews"), Some(&alice), json!({ "text": "Ok", "score": 5 })).await;
    let review_id = review["id"].as_i64().unwrap();
    let comments = format!("/api/v1/titles/{title_id}/reviews/{review_id}/comments");

    let (status, _) = app
        .post(&format!("/api/v1/titles/{other_id}/reviews/{review_id}/comments"), Some(&bob), json!({ "text": "?" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for text in ["First", "Second"] {
        let (status, body) = app.post(&comments, Some(&bob), json!({ "text": text })).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["author"], "bob");
    }

    let (status, body) = app.get(&comments, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["results"][0]["text"], "Second");

    let comment = format!("{comments}/{}", body["results"][0]["id"]);
    let (status, _) = app.patch(&comment, Some(&alice), json!({ "text": "Not yours" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.patch(&comment, Some(&bob), json!({ "text": "Edited" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["text"], "Edited");
    let (status, _) = app.post(&comments, Some(&bob), json!({ "text": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.delete(&comment, Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&comment, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_review_removes_comments() {
    let app = spawn_app().await;
    let (_, admin) = app.user_with_role("admin", Role::Admin).await;
    let (_, alice) = app.user_with_role("alice", Role::User).await;
    let title_id = app.seed_title(&admin).await;
    let reviews = format!("/api/v1/titles/{title_id}/reviews");
    let (_, review) = app.post(&reviews, Some(&alice), json!({ "text": "Ok", "score": 5 })).await;
    let review_url = format!("{reviews}/{}", review["id"]);
    app.post(&format!("{review_url}/comments"), Some(&alice), json!({ "text": "self reply" })).await;

    let (status, _) = app.delete(&review_url, Some(&alice)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("{review_url}/comments"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
