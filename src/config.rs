use std::net::SocketAddr;

use anyhow::Context;
use rand::{Rng, distributions::Alphanumeric};

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub token_secret: String,
    pub token_ttl_hours: i64,
    pub confirmation_code_ttl_minutes: i64,
    pub page_size: u64,
    pub email_from: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 =
            std::env::var("PORT").unwrap_or_else(|_| "8000".to_string()).parse().context("PORT")?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://reviewd.db?mode=rwc".to_string());

        let db_max_connections: u32 =
            std::env::var("DB_MAX_CONNECTIONS").ok().and_then(|s| s.parse().ok()).unwrap_or(8);

        let token_secret = match std::env::var("TOKEN_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                tracing::warn!("TOKEN_SECRET not set, issued tokens will not survive a restart");
                random_secret()
            },
        };

        let token_ttl_hours: i64 =
            std::env::var("TOKEN_TTL_HOURS").ok().and_then(|s| s.parse().ok()).unwrap_or(24);

        let confirmation_code_ttl_minutes: i64 = std::env::var("CONFIRMATION_CODE_TTL_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let page_size: u64 =
            std::env::var("PAGE_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(10);

        let email_from =
            std::env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@reviewd.local".to_string());

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            database_url,
            db_max_connections: db_max_connections.max(1),
            token_secret,
            token_ttl_hours,
            confirmation_code_ttl_minutes,
            page_size: page_size.max(1),
            email_from,
        })
    }
}

fn random_secret() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect()
}
