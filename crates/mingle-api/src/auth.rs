use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use rand_core::OsRng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use mingle_db::models::NewProfile;
use mingle_db::queries::users;
use mingle_types::api::{AuthResponse, Claims, LoginRequest, RequestOtpRequest, VerifyOtpRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, db_tx};
use crate::views;

/// Attempts allowed against one code before a new one must be requested.
pub const MAX_OTP_ATTEMPTS: u32 = 5;

const AVATAR_COLORS: [&str; 8] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6", "#3b82f6", "#6366f1", "#ec4899",
];

/// Hands a freshly issued sign-up code to the user.
pub trait OtpDelivery: Send + Sync {
    fn deliver(&self, email: &str, code: &str);
}

/// Writes codes to the log. There is no mail transport.
pub struct LogDelivery;

impl OtpDelivery for LogDelivery {
    fn deliver(&self, email: &str, code: &str) {
        info!("Sign-up code for {}: {}", email, code);
    }
}

// -- Validation --

fn normalize_email(raw: &str) -> ApiResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ApiError::bad_request("invalid email")),
    }
}

fn validate_username(username: &str) -> ApiResult<()> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(ApiError::bad_request("username must be 3-32 characters"));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::bad_request("username may only contain letters, digits and '_'"));
    }
    Ok(())
}

fn validate_password(password: &str) -> ApiResult<()> {
    if password.chars().count() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }
    Ok(())
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {e}"))?;
    Ok(hash.to_string())
}

fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

fn anonymous_name(rng: &mut impl Rng) -> String {
    format!("Stranger-{:04}", rng.random_range(0..10_000u32))
}

// -- Handlers --

pub async fn request_otp(
    State(state): State<AppState>,
    Json(req): Json<RequestOtpRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email)?;
    let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
    let code_hash = hash_code(&code);
    let expires_at = mingle_db::timestamp(chrono::Utc::now() + state.otp_ttl);

    let key = email.clone();
    db_tx(&state, move |conn| {
        if users::email_taken(conn, &key)? {
            return Err(ApiError::conflict("email already registered"));
        }
        users::upsert_otp(conn, &key, &code_hash, &expires_at)?;
        Ok(())
    })
    .await?;

    state.otp_delivery.deliver(&email, &code);
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "sent": true }))))
}

enum CodeCheck {
    Accepted,
    Rejected(&'static str),
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = normalize_email(&req.email)?;
    validate_username(&req.username)?;
    validate_password(&req.password)?;

    let user_id = Uuid::new_v4();
    let (anon, color) = {
        let mut rng = rand::rng();
        (anonymous_name(&mut rng), AVATAR_COLORS[rng.random_range(0..AVATAR_COLORS.len())])
    };
    let code_hash = hash_code(req.code.trim());
    let username = req.username;
    let password = req.password;

    // A wrong code must still count against the attempt limit, so rejection
    // is reported after commit instead of rolling back.
    let (check, row) = db_tx(&state, move |conn| {
        let otp = users::otp_for(conn, &email)?.ok_or_else(|| ApiError::bad_request("no code requested for this email"))?;

        if otp.attempts >= MAX_OTP_ATTEMPTS {
            return Ok((CodeCheck::Rejected("too many attempts, request a new code"), None));
        }
        if otp.expires_at < mingle_db::now() {
            return Ok((CodeCheck::Rejected("code expired"), None));
        }
        if otp.code_hash != code_hash {
            users::bump_otp_attempts(conn, &email)?;
            return Ok((CodeCheck::Rejected("invalid code"), None));
        }

        if users::email_taken(conn, &email)? {
            return Err(ApiError::conflict("email already registered"));
        }
        if users::username_taken(conn, &username)? {
            return Err(ApiError::conflict("username already taken"));
        }

        // Hash only once the code is accepted.
        let password_hash = hash_password(&password)?;

        let id = user_id.to_string();
        users::insert_profile(
            conn,
            &NewProfile {
                id: &id,
                email: &email,
                username: &username,
                password_hash: &password_hash,
                anonymous_name: &anon,
                avatar_color: color,
            },
        )?;
        users::delete_otp(conn, &email)?;
        users::set_online(conn, &id, true)?;
        Ok((CodeCheck::Accepted, users::profile_by_id(conn, &id)?))
    })
    .await?;

    if let CodeCheck::Rejected(reason) = check {
        debug!("Code verification rejected: {}", reason);
        return Err(ApiError::bad_request(reason));
    }
    let row = row.ok_or(ApiError::NotFound("profile"))?;

    let token = create_token(&state, user_id, &row.username)?;
    info!("New account {} ({})", row.username, user_id);

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: views::profile(row, true)?,
        }),
    ))
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<AuthResponse>> {
    let email = req.email.trim().to_lowercase();
    let user = db_tx(&state, move |conn| Ok(users::profile_by_email(conn, &email)?))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| anyhow::anyhow!("stored hash unreadable: {e}"))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id = views::parse_id(&user.id)?;
    let id = user.id;
    let row = db_tx(&state, move |conn| {
        users::set_online(conn, &id, true)?;
        Ok(users::profile_by_id(conn, &id)?)
    })
    .await?
    .ok_or(ApiError::Unauthorized)?;

    let token = create_token(&state, user_id, &row.username)?;

    Ok(Json(AuthResponse {
        token,
        user: views::profile(row, true)?,
    }))
}

/// Session restore: the profile behind the bearer token.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<mingle_types::api::Profile>> {
    let id = claims.sub.to_string();
    let row = db_tx(&state, move |conn| Ok(users::profile_by_id(conn, &id)?))
        .await?
        .ok_or(ApiError::NotFound("profile"))?;
    Ok(Json(views::profile(row, true)?))
}

/// Tokens are stateless; signing out only clears presence.
pub async fn logout(State(state): State<AppState>, Extension(claims): Extension<Claims>) -> ApiResult<StatusCode> {
    let id = claims.sub.to_string();
    db_tx(&state, move |conn| Ok(users::set_online(conn, &id, false)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn create_token(state: &AppState, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + state.token_ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(state.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}
