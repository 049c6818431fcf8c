use axum::RequestPartsExt;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::ApiError;

/// Signing configuration shared by token issuance and validation.
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expires_minutes: i64,
}

impl JwtConfig {
    pub fn new(
        secret: String,
        issuer: String,
        audience: String,
        expires_minutes: i64,
    ) -> anyhow::Result<Self> {
        // HS256 over a short secret is not worth signing with.
        if secret.len() < 32 {
            anyhow::bail!("JWT secret must be at least 32 bytes, got {}", secret.len());
        }

        Ok(Self {
            secret,
            issuer,
            audience,
            expires_minutes,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id the token was issued to.
    pub sub: Uuid,
    /// Unique id of this token.
    pub jti: Uuid,
    pub iss: String,
    pub aud: String,
    pub exp: usize,
}

/// Decode and verify a bearer token: signature, expiry, issuer and audience
/// all have to hold.
pub fn decode_token(token: &str, jwt: &JwtConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&jwt.issuer]);
    validation.set_audience(&[&jwt.audience]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt.secret.as_bytes()),
        &validation,
    )?;

    Ok(data.claims)
}

/// The caller's user id, resolved from the `Authorization: Bearer` header.
/// Handlers that take an `Identity` never run for unauthenticated requests;
/// the rejection is produced before any state is touched.
pub struct Identity(pub Uuid);

impl FromRequestParts<AppState> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| ApiError::Unauthorized("missing bearer token".into()))?;

        let claims = decode_token(bearer.token(), &state.jwt).map_err(|e| {
            // Log the failure kind, never the presented token.
            debug!("token rejected: {}", e);
            ApiError::Unauthorized("invalid or expired token".into())
        })?;

        Ok(Identity(claims.sub))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::create_token;

    fn config() -> JwtConfig {
        JwtConfig::new(
            "0123456789abcdef0123456789abcdef".into(),
            "amparo".into(),
            "amparo-clients".into(),
            60,
        )
        .unwrap()
    }

    #[test]
    fn short_secrets_are_refused() {
        let err = JwtConfig::new("short".into(), "i".into(), "a".into(), 60).unwrap_err();
        assert!(err.to_string().contains("32 bytes"));
    }

    #[test]
    fn issued_tokens_decode_back() {
        let jwt = config();
        let user = Uuid::new_v4();

        let token = create_token(&jwt, user).unwrap();
        let claims = decode_token(&token, &jwt).unwrap();

        assert_eq!(claims.sub, user);
        assert_eq!(claims.iss, "amparo");
        assert_eq!(claims.aud, "amparo-clients");
    }

    #[test]
    fn each_token_gets_a_fresh_jti() {
        let jwt = config();
        let user = Uuid::new_v4();

        let a = decode_token(&create_token(&jwt, user).unwrap(), &jwt).unwrap();
        let b = decode_token(&create_token(&jwt, user).unwrap(), &jwt).unwrap();

        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let jwt = config();
        let token = create_token(&jwt, Uuid::new_v4()).unwrap();

        let other = JwtConfig::new(
            "ffffffffffffffffffffffffffffffff".into(),
            jwt.issuer.clone(),
            jwt.audience.clone(),
            60,
        )
        .unwrap();

        assert!(decode_token(&token, &other).is_err());
    }

    #[test]
    fn wrong_issuer_or_audience_is_rejected() {
        let jwt = config();
        let token = create_token(&jwt, Uuid::new_v4()).unwrap();

        let mut wrong_issuer = jwt.clone();
        wrong_issuer.issuer = "someone-else".into();
        assert!(decode_token(&token, &wrong_issuer).is_err());

        let mut wrong_audience = jwt.clone();
        wrong_audience.audience = "other-app".into();
        assert!(decode_token(&token, &wrong_audience).is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut jwt = config();
        jwt.expires_minutes = -120;

        let token = create_token(&jwt, Uuid::new_v4()).unwrap();
        assert!(decode_token(&token, &jwt).is_err());
    }
}
