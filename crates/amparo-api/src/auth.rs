use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::{StatusCode, header}, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use amparo_db::Database;
use amparo_types::api::{LoginRequest, LoginResponse, RegisterRequest, UserResponse};

use crate::error::ApiError;
use crate::identity::{Claims, JwtConfig};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt: JwtConfig,
}

/// One message for both login failure modes, so responses do not reveal
/// whether the email exists.
const BAD_CREDENTIALS: &str = "invalid email or password";

/// Registration. Also mounted as `POST /api/users`: creating a user through
/// the admin surface goes through exactly the same validation and hashing.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_user_fields(&req.name, &req.email, &req.password)?;

    let db = state.clone();
    let email = req.email.clone();
    let taken = tokio::task::spawn_blocking(move || db.db.get_user_by_email(&email))
        .await
        .map_err(anyhow::Error::from)??
        .is_some();
    if taken {
        return Err(ApiError::Conflict("email already registered".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    let db = state.clone();
    let (id, name, email, phone) =
        (user_id.to_string(), req.name.clone(), req.email.clone(), req.phone.clone());
    let insert = tokio::task::spawn_blocking(move || {
        db.db.create_user(&id, &name, &email, phone.as_deref(), &password_hash)
    })
    .await
    .map_err(anyhow::Error::from)?;

    if let Err(err) = insert {
        // Lost the race against a concurrent registration of the same email.
        if amparo_db::is_unique_violation(&err) {
            return Err(ApiError::Conflict("email already registered".into()));
        }
        return Err(err.into());
    }

    let location = format!("/api/users/{}", user_id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(UserResponse {
            id: user_id,
            name: req.name,
            email: req.email,
            phone: req.phone,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let db = state.clone();
    let email = req.email.clone();
    let user = tokio::task::spawn_blocking(move || db.db.get_user_by_email(&email))
        .await
        .map_err(anyhow::Error::from)??
        .ok_or_else(|| ApiError::Unauthorized(BAD_CREDENTIALS.into()))?;

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| anyhow::anyhow!("stored password hash unreadable: {}", e))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized(BAD_CREDENTIALS.into()))?;

    let user_id: Uuid = user.id.parse().map_err(anyhow::Error::from)?;
    let token = create_token(&state.jwt, user_id)?;

    Ok(Json(LoginResponse { token }))
}

pub fn create_token(jwt: &JwtConfig, user_id: Uuid) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        jti: Uuid::new_v4(),
        iss: jwt.issuer.clone(),
        aud: jwt.audience.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::minutes(jwt.expires_minutes)).timestamp()
            as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt.secret.as_bytes()),
    )?;

    Ok(token)
}

/// Shared by registration and user update; both create a credential record.
pub(crate) fn validate_user_fields(name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::Validation("name is required".into()));
    }
    if email.trim().is_empty() {
        return Err(ApiError::Validation("email is required".into()));
    }
    if !is_valid_email(email) {
        return Err(ApiError::Validation("email is not valid".into()));
    }
    if password.trim().is_empty() {
        return Err(ApiError::Validation("password is required".into()));
    }
    if password.chars().count() < 6 {
        return Err(ApiError::Validation("password must be at least 6 characters".into()));
    }
    Ok(())
}

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();

    Ok(hash)
}

/// Minimal shape check: one '@' with a non-empty local part and a dotted
/// domain behind it. Deliverability is the mail system's problem.
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    // At least one '.' with something on both sides of it.
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_emails() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("a@b.c"));
        assert!(is_valid_email("first.last@mail.example.org"));
    }

    #[test]
    fn rejects_shapeless_emails() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@domain"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("user@com."));
        assert!(!is_valid_email("a@b@c.com"));
    }

    #[test]
    fn field_validation_reports_first_failure() {
        let err = validate_user_fields("", "a@b.c", "secret1").unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("name")));

        let err = validate_user_fields("Ana", "  ", "secret1").unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("email")));

        let err = validate_user_fields("Ana", "not-an-email", "secret1").unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("not valid")));

        let err = validate_user_fields("Ana", "a@b.c", "12345").unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("6 characters")));

        assert!(validate_user_fields("Ana", "a@b.c", "123456").is_ok());
    }

    #[test]
    fn hashes_verify_and_differ_per_salt() {
        let first = hash_password("hunter22").unwrap();
        let second = hash_password("hunter22").unwrap();
        assert_ne!(first, second);

        let parsed = PasswordHash::new(&first).unwrap();
        assert!(Argon2::default().verify_password(b"hunter22", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }
}
