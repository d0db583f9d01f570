use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    entities::user::{self, Role},
    error::{AppError, AppResult},
    permissions::Ownership,
};

const CONFIRMATION_CODE_LEN: usize = 24;
const TOKEN_KEY_CONTEXT: &str = "reviewd 2024-01-01 bearer token signing";

/// Who is making the request. Passed explicitly into every domain operation.
#[derive(Clone, Debug)]
pub enum Identity {
    Anonymous,
    User(user::Model),
}

impl Identity {
    pub fn role(&self) -> Option<Role> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user.role),
        }
    }

    pub fn user(&self) -> Option<&user::Model> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }

    pub fn require_user(&self) -> AppResult<&user::Model> {
        self.user().ok_or(AppError::Unauthorized)
    }

    /// Ownership of a record authored by (or being) `user_id`.
    pub fn ownership(&self, user_id: i32) -> Ownership {
        match self.user() {
            Some(user) if user.id == user_id => Ownership::Owner,
            _ => Ownership::NotOwner,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies `payload.mac` bearer tokens keyed with blake3.
#[derive(Clone)]
pub struct TokenSigner {
    key: [u8; 32],
    ttl_seconds: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            key: blake3::derive_key(TOKEN_KEY_CONTEXT, secret.as_bytes()),
            ttl_seconds: ttl_hours.saturating_mul(3_600),
        }
    }

    pub fn issue(&self, user: &user::Model) -> AppResult<String> {
        let now = now_sec();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            iat: now,
            exp: now.saturating_add(self.ttl_seconds),
        };
        let payload = serde_json::to_vec(&claims).map_err(anyhow::Error::new)?;
        let payload = URL_SAFE_NO_PAD.encode(payload);
        let mac = blake3::keyed_hash(&self.key, payload.as_bytes());
        Ok(format!("{payload}.{}", URL_SAFE_NO_PAD.encode(mac.as_bytes())))
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let (payload, mac) = token.split_once('.').ok_or(AppError::Unauthorized)?;

        let mac = URL_SAFE_NO_PAD.decode(mac).map_err(|_| AppError::Unauthorized)?;
        let mac: [u8; 32] = mac.try_into().map_err(|_| AppError::Unauthorized)?;
        // blake3::Hash equality is constant time.
        if blake3::Hash::from(mac) != blake3::keyed_hash(&self.key, payload.as_bytes()) {
            return Err(AppError::Unauthorized);
        }

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| AppError::Unauthorized)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| AppError::Unauthorized)?;
        if claims.exp < now_sec() {
            return Err(AppError::Unauthorized);
        }
        Ok(claims)
    }
}

pub fn generate_confirmation_code() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(CONFIRMATION_CODE_LEN).map(char::from).collect()
}

impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Identity::Anonymous);
        };

        let token = header
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or(AppError::Unauthorized)?;
        let claims = state.tokens.verify(token)?;

        // Reload so role changes and deletions apply to already issued tokens.
        let Some(user) = user::Entity::find_by_id(claims.sub).one(&state.db).await? else {
            tracing::debug!(user_id = claims.sub, "token for a deleted user");
            return Err(AppError::Unauthorized);
        };

        Ok(Identity::User(user))
    }
}

pub(crate) fn now_sec() -> i64 {
    jiff::Timestamp::now().as_second()
}
