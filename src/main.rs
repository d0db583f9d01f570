use std::sync::Arc;

use reviewd::{AppState, build_router, config::Config, db, mailer::LogMailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,reviewd=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let db = db::connect_and_migrate(&config.database_url, config.db_max_connections).await?;
    let state = Arc::new(AppState::new(config.clone(), db, Arc::new(LogMailer)));

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
