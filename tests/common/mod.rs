#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use reviewd::{
    AppState, build_router,
    config::Config,
    db,
    entities::user::{self, Role},
    mailer::Outbox,
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{Value, json};
use tower::util::ServiceExt;

pub const PAGE_SIZE: u64 = 3;

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub outbox: Arc<Outbox>,
}

pub fn test_config() -> Config {
    Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        token_secret: "test-secret".to_string(),
        token_ttl_hours: 1,
        confirmation_code_ttl_minutes: 10,
        page_size: PAGE_SIZE,
        email_from: "noreply@reviewd.test".to_string(),
    }
}

pub async fn spawn_app() -> TestApp {
    let config = Arc::new(test_config());
    let db = db::connect_and_migrate(&config.database_url, config.db_max_connections)
        .await
        .expect("in-memory database should migrate");
    let outbox = Arc::new(Outbox::new());
    let state = Arc::new(AppState::new(config, db, outbox.clone()));
    TestApp { router: build_router(state.clone()), state, outbox }
}

impl TestApp {
    pub async fn call(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("Should read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Should parse JSON")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call("GET", uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call("POST", uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.call("PATCH", uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.call("DELETE", uri, token, None).await
    }

    /// Inserts a confirmed user directly and returns it with a valid token.
    pub async fn user_with_role(&self, username: &str, role: Role) -> (user::Model, String) {
        let model = user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            role: Set(role),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            bio: Set(String::new()),
            is_confirmed: Set(true),
            date_joined: Set(0),
            ..Default::default()
        }
        .insert(&self.state.db)
        .await
        .unwrap();
        let token = self.state.tokens.issue(&model).unwrap();
        (model, token)
    }

    /// Confirmation code from the latest email sent to `email`.
    pub fn code_for(&self, email: &str) -> String {
        let message = self.outbox.last_to(email).expect("confirmation email should be sent");
        message.body.rsplit(": ").next().unwrap().to_string()
    }

    /// Creates category `movie`, genres `drama`/`comedy` and one title; returns the title id.
    pub async fn seed_title(&self, admin: &str) -> i64 {
        let (status, _) =
            self.post("/api/v1/categories", Some(admin), json!({ "name": "Movie", "slug": "movie" })).await;
        assert_eq!(status, StatusCode::CREATED);
        for (name, slug) in [("Drama", "drama"), ("Comedy", "comedy")] {
            let (status, _) =
                self.post("/api/v1/genres", Some(admin), json!({ "name": name, "slug": slug })).await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (status, body) = self
            .post(
                "/api/v1/titles",
                Some(admin),
                json!({
                    "name": "The Godfather",
                    "year": 1972,
                    "description": "Crime saga",
                    "category": "movie",
                    "genre": ["drama"],
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}
