use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;
use uuid::Uuid;

use insight_dataset::storage::FileStore;
use insight_db::{Database, is_constraint_violation};
use insight_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::blocking;
use crate::error::{ApiError, FieldErrors};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub store: Arc<dyn FileStore>,
    pub jwt_secret: String,
    pub max_upload_bytes: usize,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    let mut errors = FieldErrors::new();
    if req.username.len() < 3 || req.username.len() > 32 {
        errors.insert("username", "Username must be 3 to 32 characters.".into());
    }
    if !req.email.contains('@') || req.email.len() > 254 {
        errors.insert("email", "Enter a valid email address.".into());
    }
    if req.password.len() < 8 {
        errors.insert("password", "Password must be at least 8 characters.".into());
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let user_id = Uuid::new_v4();
    let token = create_token(&state.jwt_secret, user_id, &req.username)?;

    let username = req.username.clone();
    blocking(move || {
        // Check if username is taken
        if state.db.get_user_by_username(&req.username)?.is_some() {
            return Err(ApiError::Conflict("Username already taken".into()));
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
            .to_string();

        insert_user(&state.db, &user_id.to_string(), &req.username, &req.email, &password_hash)
    })
    .await?;

    info!("Registered user {} ({})", username, user_id);

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let secret = state.jwt_secret.clone();
    let user = blocking(move || {
        let user = state
            .db
            .get_user_by_username(&req.username)?
            .ok_or(ApiError::Unauthorized)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("Stored password hash unreadable: {}", e))?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthorized)?;

        Ok(user)
    })
    .await?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e))?;

    let token = create_token(&secret, user_id, &user.username)?;

    Ok(Json(LoginResponse {
        user_id,
        username: user.username,
        token,
    }))
}

/// Inserts the user. A concurrent registration that won the race on the
/// username surfaces as a conflict, like the pre-check above.
fn insert_user(db: &Database, id: &str, username: &str, email: &str, password_hash: &str) -> Result<(), ApiError> {
    db.create_user(id, username, email, password_hash).map_err(|e| {
        if is_constraint_violation(&e) {
            ApiError::Conflict("Username already taken".into())
        } else {
            e.into()
        }
    })
}

pub fn create_token(secret: &str, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
