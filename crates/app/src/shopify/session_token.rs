//! App Bridge session tokens.
//!
//! The embedded admin UI sends a short-lived HS256 JWT signed with the app's
//! API secret in `Authorization: Bearer <token>`. A valid token names the shop
//! in its `dest` claim.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vton_core::ShopDomain;

/// Allowed clock skew for `exp` and `nbf`, in seconds.
const LEEWAY_SECONDS: u64 = 5;

/// Session token validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("missing authorization header")]
    MissingAuthorization,
    #[error("invalid authorization scheme")]
    InvalidAuthorizationScheme,
    #[error("invalid session token")]
    InvalidToken,
    #[error("session token expired")]
    Expired,
    #[error("session token is not valid yet")]
    NotYetValid,
    #[error("session token issuer does not match destination")]
    IssuerMismatch,
    #[error("session token destination is not a shop: {0}")]
    InvalidShop(String),
}

/// Claims carried by an App Bridge session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokenClaims {
    /// Shop admin URL, e.g. `https://demo.myshopify.com/admin`.
    pub iss: String,
    /// Shop URL, e.g. `https://demo.myshopify.com`.
    pub dest: String,
    /// The app's API key.
    pub aud: String,
    /// Shopify user id.
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
    pub nbf: i64,
    pub iat: i64,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
}

/// Validates session tokens against the app's credentials.
#[derive(Clone)]
pub struct SessionTokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    custom_shop_domain: Option<String>,
}

impl std::fmt::Debug for SessionTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenVerifier")
            .field("decoding_key", &"[REDACTED]")
            .field("custom_shop_domain", &self.custom_shop_domain)
            .finish_non_exhaustive()
    }
}

impl SessionTokenVerifier {
    /// Create a verifier for tokens addressed to `api_key` and signed with
    /// `api_secret`.
    #[must_use]
    pub fn new(api_key: &str, api_secret: &SecretString, custom_shop_domain: Option<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[api_key]);
        validation.set_required_spec_claims(&["exp", "nbf", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = LEEWAY_SECONDS;

        Self {
            decoding_key: DecodingKey::from_secret(api_secret.expose_secret().as_bytes()),
            validation,
            custom_shop_domain,
        }
    }

    /// Pull the token out of an `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is absent or not a non-empty Bearer
    /// credential.
    pub fn extract_bearer_token(header_value: Option<&str>) -> Result<&str, SessionTokenError> {
        let raw = header_value.ok_or(SessionTokenError::MissingAuthorization)?;
        let Some(token) = raw.trim().strip_prefix("Bearer ") else {
            return Err(SessionTokenError::InvalidAuthorizationScheme);
        };
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionTokenError::InvalidAuthorizationScheme);
        }
        Ok(token)
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature, audience or time window is invalid,
    /// or if `iss` does not belong to `dest`.
    pub fn claims(&self, token: &str) -> Result<SessionTokenClaims, SessionTokenError> {
        let claims = decode::<SessionTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(map_decode_error)?
            .claims;

        if !claims.iss.starts_with(&claims.dest) {
            return Err(SessionTokenError::IssuerMismatch);
        }

        Ok(claims)
    }

    /// Validate a token and return the shop it was issued for.
    ///
    /// # Errors
    ///
    /// Same as [`Self::claims`], plus `InvalidShop` if `dest` is not a shop
    /// domain.
    pub fn verify(&self, token: &str) -> Result<ShopDomain, SessionTokenError> {
        let claims = self.claims(token)?;
        shop_from_dest(&claims.dest, self.custom_shop_domain.as_deref())
    }
}

fn shop_from_dest(dest: &str, custom: Option<&str>) -> Result<ShopDomain, SessionTokenError> {
    let host = url::Url::parse(dest)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .ok_or_else(|| SessionTokenError::InvalidShop(dest.to_string()))?;

    ShopDomain::parse_with_custom(&host, custom)
        .map_err(|_| SessionTokenError::InvalidShop(dest.to_string()))
}

fn map_decode_error(error: jsonwebtoken::errors::Error) -> SessionTokenError {
    match error.kind() {
        ErrorKind::ExpiredSignature => SessionTokenError::Expired,
        ErrorKind::ImmatureSignature => SessionTokenError::NotYetValid,
        _ => SessionTokenError::InvalidToken,
    }
}
