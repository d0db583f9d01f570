pub mod accounts;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod models;
pub mod pagination;
pub mod permissions;
pub mod rating;
pub mod reviews;
pub mod routes;
pub mod validation;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::TokenSigner, config::Config, mailer::Mailer};

pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub tokens: TokenSigner,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: DatabaseConnection, mailer: Arc<dyn Mailer>) -> Self {
        let tokens = TokenSigner::new(&config.token_secret, config.token_ttl_hours);
        Self { config, db, tokens, mailer }
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/auth/signup", post(routes::signup))
        .route("/auth/token", post(routes::token))
        .route("/categories", get(routes::list_categories).post(routes::create_category))
        .route(
            "/categories/{slug}",
            get(routes::get_category).patch(routes::update_category).delete(routes::delete_category),
        )
        .route("/genres", get(routes::list_genres).post(routes::create_genre))
        .route(
            "/genres/{slug}",
            get(routes::get_genre).patch(routes::update_genre).delete(routes::delete_genre),
        )
        .route("/titles", get(routes::list_titles).post(routes::create_title))
        .route(
            "/titles/{title_id}",
            get(routes::get_title).patch(routes::update_title).delete(routes::delete_title),
        )
        .route("/titles/{title_id}/reviews", get(routes::list_reviews).post(routes::create_review))
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(routes::get_review).patch(routes::update_review).delete(routes::delete_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(routes::list_comments).post(routes::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(routes::get_comment).patch(routes::update_comment).delete(routes::delete_comment),
        )
        .route("/users", get(routes::list_users).post(routes::create_user))
        .route("/users/me", get(routes::me).patch(routes::update_me))
        .route(
            "/users/{username}",
            get(routes::get_user).patch(routes::update_user).delete(routes::delete_user),
        );

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
}
