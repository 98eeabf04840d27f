use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        cookies,
        extractor::CurrentUser,
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    config::TokenTransport,
    error::ApiError,
    state::AppState,
    users::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, PasswordChangeRequest, SignupRequest,
            SignupResponse, UpdateProfileRequest, UserResponse,
        },
        repo::User,
    },
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/detail-update", post(detail_update))
        .route("/password-change", post(password_change))
        .route("/delete-account", post(delete_account))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

const MIN_PASSWORD_LEN: usize = 8;

struct TokenPair {
    access_token: String,
    refresh_token: String,
}

/// Signs an access/refresh pair and persists the refresh token as the
/// single active one for this user. A plain column update, nothing else
/// on the row is touched.
async fn issue_token_pair(
    state: &AppState,
    keys: &JwtKeys,
    user: &User,
) -> Result<TokenPair, ApiError> {
    let access_token = keys.sign_access(user)?;
    let refresh_token = keys.sign_refresh(user.id)?;
    User::set_refresh_token(&state.db, user.id, &refresh_token).await?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    payload.username = payload.username.trim().to_lowercase();
    payload.email = payload.email.trim().to_lowercase();
    payload.full_name = payload.full_name.trim().to_string();
    payload.mobile_number = payload.mobile_number.trim().to_string();

    if payload.full_name.is_empty()
        || payload.email.is_empty()
        || payload.username.is_empty()
        || payload.mobile_number.is_empty()
        || payload.password.is_empty()
    {
        return Err(ApiError::validation("Please provide all required fields"));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("Invalid email"));
    }
    if payload.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    let hash = hash_password(&payload.password)?;

    // No existence pre-check: the unique indexes reject a duplicate insert
    // and the violation maps to 409, which also settles races between
    // concurrent signups.
    let user = User::create(
        &state.db,
        &payload.username,
        &payload.email,
        &payload.full_name,
        &payload.mobile_number,
        &hash,
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    issue_token_pair(&state, &keys, &user).await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(SignupResponse { user: user.into() }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    let email = payload
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty());
    let username = payload
        .username
        .as_deref()
        .map(|u| u.trim().to_lowercase())
        .filter(|u| !u.is_empty());

    if (email.is_none() && username.is_none()) || payload.password.is_empty() {
        return Err(ApiError::validation(
            "Please provide email or username, and a password",
        ));
    }

    // Unknown identity and wrong password are indistinguishable to the
    // caller.
    let user = User::find_by_email_or_username(&state.db, email.as_deref(), username.as_deref())
        .await?
        .ok_or_else(|| {
            warn!("login with unknown identity");
            ApiError::unauthorized("Invalid credentials")
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let pair = issue_token_pair(&state, &keys, &user).await?;

    let jar = match state.config.token_transport {
        TokenTransport::Cookie => jar
            .add(cookies::access_cookie(
                pair.access_token.clone(),
                keys.access_ttl,
            ))
            .add(cookies::refresh_cookie(
                pair.refresh_token.clone(),
                keys.refresh_ttl,
            )),
        TokenTransport::Bearer => jar,
    };

    info!(user_id = %user.id, "user logged in");
    Ok((
        jar,
        Json(LoginResponse {
            user: user.into(),
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }),
    ))
}

#[instrument(skip(state, user, jar))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), ApiError> {
    User::clear_refresh_token(&state.db, user.id).await?;

    let jar = jar
        .add(cookies::clear_access_cookie())
        .add(cookies::clear_refresh_cookie());

    info!(user_id = %user.id, "user logged out");
    Ok((
        jar,
        Json(MessageResponse {
            message: "Logged out".into(),
        }),
    ))
}

#[instrument(skip(user))]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

#[instrument(skip(state, user, payload))]
pub async fn detail_update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(mut payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    payload.full_name = payload.full_name.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();
    payload.mobile_number = payload.mobile_number.trim().to_string();

    if payload.full_name.is_empty() || payload.email.is_empty() {
        return Err(ApiError::validation("Please provide fullName and email"));
    }
    if !is_valid_email(&payload.email) {
        return Err(ApiError::validation("Invalid email"));
    }

    // Blank mobile number leaves the stored one unchanged.
    let mobile_number = (!payload.mobile_number.is_empty()).then_some(payload.mobile_number.as_str());

    let updated = User::update_profile(
        &state.db,
        user.id,
        &payload.full_name,
        &payload.email,
        mobile_number,
    )
    .await?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(updated.into()))
}

#[instrument(skip(state, user, payload))]
pub async fn password_change(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<PasswordChangeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if payload.old_password.is_empty() || payload.new_password.is_empty() {
        return Err(ApiError::validation(
            "Please provide oldPassword and newPassword",
        ));
    }

    if !verify_password(&payload.old_password, &user.password_hash)? {
        warn!(user_id = %user.id, "password change with wrong old password");
        return Err(ApiError::validation("Invalid old password"));
    }
    if payload.new_password == payload.old_password {
        return Err(ApiError::validation(
            "New password must differ from the old one",
        ));
    }
    if payload.new_password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(
            "Password must be at least 8 characters",
        ));
    }

    let hash = hash_password(&payload.new_password)?;
    User::update_password(&state.db, user.id, &hash).await?;

    info!(user_id = %user.id, "password changed");
    Ok(Json(MessageResponse {
        message: "Password changed".into(),
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    let removed = User::delete(&state.db, user.id).await?;
    if removed == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    info!(user_id = %user.id, "account deleted");
    Ok(Json(MessageResponse {
        message: "Account deleted".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("spaces in@x.com"));
        assert!(!is_valid_email(""));
    }
}
