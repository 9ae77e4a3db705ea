use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rail_core::{AuthError, Authenticator, Identity, NewUser, Role, StoreError, User};
use rail_shared::Masked;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::AppJson;
use crate::password::{hash_password, validate_password_strength, verify_password};
use crate::state::AppState;

const MAX_USERNAME_LEN: usize = 150;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub role: String,
    pub exp: usize,
}

/// HS256 token issuer and verifier.
pub struct JwtGate {
    secret: Masked<String>,
    expiration_seconds: u64,
}

impl JwtGate {
    pub fn new(secret: Masked<String>, expiration_seconds: u64) -> Self {
        Self {
            secret,
            expiration_seconds,
        }
    }

    pub fn issue(&self, user: &User) -> Result<Masked<String>, AppError> {
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            role: user.role.to_string(),
            exp: (Utc::now() + Duration::seconds(self.expiration_seconds as i64)).timestamp() as usize,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.expose().as_bytes()),
        )
        .map(Masked)
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
    }
}

#[async_trait]
impl Authenticator for JwtGate {
    async fn authenticate(&self, credential: &str) -> Result<Identity, AuthError> {
        let token_data = decode::<Claims>(
            credential,
            &DecodingKey::from_secret(self.secret.expose().as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let claims = token_data.claims;
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("malformed subject".to_string()))?;
        let role = claims.role.parse::<Role>().map_err(AuthError::InvalidToken)?;

        Ok(Identity {
            user_id,
            username: claims.username,
            role,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    username: String,
    password: Masked<String>,
    #[serde(default)]
    role: Role,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: Masked<String>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    username: String,
    role: Role,
    token: Masked<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let username = req.username.trim();
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::ValidationError(format!(
            "Username must be 1 to {} characters",
            MAX_USERNAME_LEN
        )));
    }
    validate_password_strength(req.password.expose(), state.auth.min_password_length)
        .map_err(AppError::ValidationError)?;
    if req.role == Role::Admin && !state.auth.allow_admin_registration {
        return Err(AppError::AuthorizationError(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    let password_hash = hash_password(req.password.expose())
        .map_err(|e| AppError::InternalServerError(format!("Password hashing failed: {}", e)))?;

    let user = state
        .users
        .create_user(&NewUser {
            username: username.to_string(),
            password_hash,
            role: req.role,
        })
        .await
        .map_err(|err| match err {
            StoreError::Conflict(_) => {
                AppError::ConflictError("A user with that username already exists.".to_string())
            }
            other => other.into(),
        })?;

    info!(username = %user.username, role = %user.role, "Registered user");

    let token = state.tokens.issue(&user)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            username: user.username,
            role: user.role,
            token,
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::AuthenticationError("Invalid username or password".to_string());

    let user = state
        .users
        .find_by_username(&req.username)
        .await?
        .ok_or_else(invalid)?;

    let password_valid = verify_password(req.password.expose(), &user.password_hash)
        .map_err(|e| AppError::InternalServerError(format!("Password verification error: {}", e)))?;
    if !password_valid {
        return Err(invalid());
    }

    let token = state.tokens.issue(&user)?;
    Ok(Json(AuthResponse {
        username: user.username,
        role: user.role,
        token,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> JwtGate {
        JwtGate::new(Masked("test-secret".to_string()), 60)
    }

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "ravi".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_issued_token_authenticates() {
        let gate = gate();
        let user = user(Role::Admin);
        let token = gate.issue(&user).unwrap();

        let identity = gate.authenticate(token.expose()).await.unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.username, "ravi");
        assert!(identity.is_admin());
    }

    #[tokio::test]
    async fn test_foreign_token_is_rejected() {
        let other = JwtGate::new(Masked("other-secret".to_string()), 60);
        let token = other.issue(&user(Role::User)).unwrap();

        let err = gate().authenticate(token.expose()).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
        assert!(gate().authenticate("garbage").await.is_err());
    }
}
