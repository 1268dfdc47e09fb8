//! services/api/src/web/auth.rs
//!
//! Account endpoints: signup, login, logout, email verification and the
//! throttled "resend verification email" flow.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use derecho_core::domain::{AuthSession, VerificationToken};
use derecho_core::email::{is_suspicious_email, validate_email};
use derecho_core::ports::PortError;
use derecho_core::rate_limit::{email_resend_key, RateLimitStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::web::middleware::session_cookie;
use crate::web::state::AppState;

const MIN_PASSWORD_LEN: usize = 6;
const SESSION_DAYS: i64 = 30;
const VERIFICATION_HOURS: i64 = 24;

pub const PASSWORD_MISMATCH: &str = "Las contraseñas no coinciden";
pub const PASSWORD_TOO_SHORT: &str = "La contraseña debe tener al menos 6 caracteres";
pub const EMAIL_TAKEN: &str = "Este correo ya está registrado. Por favor inicia sesión.";
pub const INVALID_CREDENTIALS: &str = "Correo o contraseña incorrectos";
pub const EMAIL_NOT_VERIFIED: &str =
    "Debes verificar tu correo electrónico antes de iniciar sesión.";
pub const INVALID_VERIFICATION: &str = "El enlace de verificación no es válido o ha expirado.";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub display_name: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Deserialize, IntoParams)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Serialize, ToSchema)]
pub struct SignupResponse {
    pub user_id: Uuid,
    pub email: String,
    pub verification_required: bool,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Current throttling state for an address.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RateLimitStatusResponse {
    pub is_allowed: bool,
    pub remaining_attempts: u32,
    pub reset_time: Option<DateTime<Utc>>,
    pub message: Option<String>,
}

impl From<RateLimitStatus> for RateLimitStatusResponse {
    fn from(status: RateLimitStatus) -> Self {
        Self {
            is_allowed: status.is_allowed,
            remaining_attempts: status.remaining_attempts,
            reset_time: status.reset_time,
            message: status.message,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct EmailValidationResponse {
    pub is_valid: bool,
    pub error: Option<String>,
    pub corrected_email: Option<String>,
    pub is_suspicious: bool,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn internal(context: &str, e: impl std::fmt::Debug) -> (StatusCode, String) {
    error!("{}: {:?}", context, e);
    (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
}

/// Runs the address through validation and returns the normalised form.
fn normalised_email(raw: &str) -> Result<String, (StatusCode, String)> {
    let validation = validate_email(raw);
    match (validation.is_valid, validation.corrected_email) {
        (true, Some(email)) => Ok(email),
        _ => Err((
            StatusCode::BAD_REQUEST,
            validation.error.unwrap_or_default(),
        )),
    }
}

fn session_cookie_header(auth_session_id: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    )
}

/// Stores a fresh verification token for the account and hands it to the mailer.
async fn issue_verification(
    state: &AppState,
    user_id: Uuid,
    email: &str,
) -> Result<(), (StatusCode, String)> {
    let token = VerificationToken {
        token: Uuid::new_v4().simple().to_string(),
        user_id,
        expires_at: Utc::now() + Duration::hours(VERIFICATION_HOURS),
    };

    state
        .db
        .create_verification_token(&token)
        .await
        .map_err(|e| internal("Failed to store verification token", e))?;

    state
        .mailer
        .send_verification(email, &token.token)
        .await
        .map_err(|e| internal("Failed to send verification email", e))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new, unverified account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created; verification email sent", body = SignupResponse),
        (status = 400, description = "Invalid email or password"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Validate the input
    let email = normalised_email(&req.email)?;
    if req.password != req.confirm_password {
        return Err((StatusCode::BAD_REQUEST, PASSWORD_MISMATCH.to_string()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err((StatusCode::BAD_REQUEST, PASSWORD_TOO_SHORT.to_string()));
    }
    if is_suspicious_email(&email) {
        warn!(email = %email, "Signup with a disposable email domain");
    }

    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    // 2. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| internal("Failed to hash password", e))?
        .to_string();

    // 3. Create the account and its profile
    let user = state
        .db
        .create_user_with_email(&email, &password_hash, &display_name)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => (StatusCode::CONFLICT, EMAIL_TAKEN.to_string()),
            other => internal("Failed to create user", other),
        })?;

    // 4. Send the first verification email
    issue_verification(&state, user.user_id, &user.email).await?;
    info!(user_id = %user.user_id, "Account created, awaiting verification");

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user_id: user.user_id,
            email: user.email,
            verification_required: !user.email_verified,
        }),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not verified yet"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Get user by email
    let email = req.email.trim().to_lowercase();
    let user_creds = state
        .db
        .get_user_by_email(&email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()),
            other => internal("Failed to get user", other),
        })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password)
        .map_err(|e| internal("Authentication error", e))?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    if !valid {
        return Err((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()));
    }

    if !user_creds.email_verified {
        return Err((StatusCode::FORBIDDEN, EMAIL_NOT_VERIFIED.to_string()));
    }

    // 3. Create auth session
    let session = AuthSession {
        id: Uuid::new_v4().to_string(),
        user_id: user_creds.user_id,
        expires_at: Utc::now() + Duration::days(SESSION_DAYS),
    };

    state
        .db
        .create_auth_session(&session)
        .await
        .map_err(|e| internal("Failed to create session", e))?;

    // 4. Return response with cookie
    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie_header(&session.id))],
        Json(response),
    ))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_cookie(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| internal("Failed to logout", e))?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

/// POST /auth/verify - Redeem a verification token
#[utoipa::path(
    post,
    path = "/auth/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Email verified", body = MessageResponse),
        (status = 400, description = "Unknown or expired token"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn verify_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let token = state
        .db
        .take_verification_token(req.token.trim())
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => (StatusCode::BAD_REQUEST, INVALID_VERIFICATION.to_string()),
            other => internal("Failed to read verification token", other),
        })?;

    if token.is_expired(Utc::now()) {
        return Err((StatusCode::BAD_REQUEST, INVALID_VERIFICATION.to_string()));
    }

    state
        .db
        .mark_email_verified(token.user_id)
        .await
        .map_err(|e| internal("Failed to verify email", e))?;
    info!(user_id = %token.user_id, "Email verified");

    Ok(Json(MessageResponse {
        message: "¡Correo verificado con éxito!".to_string(),
    }))
}

/// POST /auth/resend - Resend the verification email, throttled per address
///
/// The response is the same whether or not the address has an account.
#[utoipa::path(
    post,
    path = "/auth/resend",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Attempt recorded", body = RateLimitStatusResponse),
        (status = 400, description = "Invalid email"),
        (status = 429, description = "Too many attempts", body = RateLimitStatusResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn resend_verification_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EmailRequest>,
) -> Result<(StatusCode, Json<RateLimitStatusResponse>), (StatusCode, String)> {
    let email = normalised_email(&req.email)?;

    let status = state
        .resend_limiter
        .consume(&email_resend_key(&email), state.config.resend_policy);
    if !status.is_allowed {
        info!(email = %email, reset_time = ?status.reset_time, "Resend refused by rate limit");
        return Ok((StatusCode::TOO_MANY_REQUESTS, Json(status.into())));
    }

    match state.db.get_user_by_email(&email).await {
        Ok(user) if !user.email_verified => {
            issue_verification(&state, user.user_id, &user.email).await?;
        }
        Ok(_) => debug!(email = %email, "Resend requested for a verified account"),
        Err(PortError::NotFound(_)) => debug!(email = %email, "Resend requested for an unknown address"),
        Err(e) => return Err(internal("Failed to look up user", e)),
    }

    Ok((StatusCode::OK, Json(status.into())))
}

/// GET /auth/resend/status - Report the throttling state without spending an attempt
#[utoipa::path(
    get,
    path = "/auth/resend/status",
    params(EmailQuery),
    responses(
        (status = 200, description = "Current state", body = RateLimitStatusResponse)
    )
)]
pub async fn resend_status_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
) -> Json<RateLimitStatusResponse> {
    let status = state
        .resend_limiter
        .peek(&email_resend_key(&query.email), state.config.resend_policy);
    Json(status.into())
}

/// POST /auth/validate-email - Check an address before submitting a form
#[utoipa::path(
    post,
    path = "/auth/validate-email",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Validation result", body = EmailValidationResponse)
    )
)]
pub async fn validate_email_handler(Json(req): Json<EmailRequest>) -> Json<EmailValidationResponse> {
    let validation = validate_email(&req.email);
    Json(EmailValidationResponse {
        is_valid: validation.is_valid,
        error: validation.error,
        corrected_email: validation.corrected_email,
        is_suspicious: is_suspicious_email(&req.email),
    })
}
