use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::extractors::auth::{AuthUser, RoleLevel};

/// JWT Claims structure. Carries everything the session needs so protected
/// routes never have to reload the account.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Username
    pub uid: i32,    // User ID
    pub level: RoleLevel,
    pub pid: Option<i32>, // Linked participant ID
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub epoch: i32, // Account session epoch at login
    pub exp: usize, // Expiration timestamp
}

/// Sign a new session token for a user.
pub fn sign(user: &AuthUser, secret: &str, ttl_hours: i64) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| anyhow!("session expiry out of range"))?
        .timestamp();

    let claims = Claims {
        sub: user.username.clone(),
        uid: user.user_id,
        level: user.level,
        pid: user.participant_id,
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        epoch: user.session_epoch,
        exp: expiration as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify and decode a session token.
pub fn verify(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
