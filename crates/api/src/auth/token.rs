//! ID token validation.
//!
//! Clients authenticate with HS256-signed ID tokens issued by the identity
//! provider. The token's `sub` claim is the opaque user identity string;
//! this server never interprets it beyond using it as the ownership key.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims embedded in every ID token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the opaque user identity string.
    pub sub: String,
    /// Token issuer.
    pub iss: String,
    /// Intended audience.
    pub aud: String,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
}

/// Configuration for ID token verification.
#[derive(Debug, Clone)]
pub struct IdTokenConfig {
    /// HMAC-SHA256 secret shared with the identity provider.
    pub secret: String,
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected `aud` claim.
    pub audience: String,
}

impl IdTokenConfig {
    /// Load ID token configuration from environment variables.
    ///
    /// | Env Var             | Required | Default             |
    /// |---------------------|----------|---------------------|
    /// | `ID_TOKEN_SECRET`   | **yes**  | --                  |
    /// | `ID_TOKEN_ISSUER`   | no       | `econote-identity`  |
    /// | `ID_TOKEN_AUDIENCE` | no       | `econote`           |
    ///
    /// # Panics
    ///
    /// Panics if `ID_TOKEN_SECRET` is not set or is empty.
    pub fn from_env() -> Self {
        let secret = std::env::var("ID_TOKEN_SECRET")
            .expect("ID_TOKEN_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "ID_TOKEN_SECRET must not be empty");

        let issuer =
            std::env::var("ID_TOKEN_ISSUER").unwrap_or_else(|_| "econote-identity".into());
        let audience = std::env::var("ID_TOKEN_AUDIENCE").unwrap_or_else(|_| "econote".into());

        Self {
            secret,
            issuer,
            audience,
        }
    }
}

/// Validate and decode an ID token, returning the embedded [`Claims`].
///
/// Validates the signature, expiration, issuer, and audience.
pub fn verify_id_token(
    token: &str,
    config: &IdTokenConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::default(); // HS256, validates exp
    validation.set_issuer(&[&config.issuer]);
    validation.set_audience(&[&config.audience]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )?;
    Ok(token_data.claims)
}

/// Issue an HS256 ID token for the given subject.
///
/// Used by tests and local tooling; production tokens come from the
/// identity provider.
pub fn issue_id_token(
    subject: &str,
    ttl_secs: i64,
    config: &IdTokenConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: subject.to_owned(),
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
        exp: chrono::Utc::now().timestamp() + ttl_secs,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}
