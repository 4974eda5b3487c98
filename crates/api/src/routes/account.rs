//! Registration, login and profile endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::UserId;
use domain::Registration;
use serde::{Deserialize, Serialize};
use store::{ProfileUpdate, Store, User};

use super::MessageResponse;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct RegisteredResponse {
    pub message: &'static str,
    pub user_id: UserId,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: UserId,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

// -- Handlers --

/// POST /register — creates a user account.
#[tracing::instrument(skip_all)]
pub async fn register<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredResponse>), ApiError> {
    let (Some(username), Some(email), Some(password)) = (req.username, req.email, req.password)
    else {
        return Err(ApiError::missing_data());
    };

    let user = state
        .accounts
        .register(Registration {
            username,
            email,
            password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            message: "User registered successfully",
            user_id: user.id,
        }),
    ))
}

/// POST /login — exchanges email and password for a bearer token.
#[tracing::instrument(skip_all)]
pub async fn login<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(ApiError::missing_data());
    };

    let login = state.accounts.login(&email, password).await?;
    Ok(Json(LoginResponse {
        token: login.token,
        user_id: login.user_id,
    }))
}

/// GET /profile — returns the caller's profile.
#[tracing::instrument(skip_all)]
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<ProfileResponse> {
    Json(ProfileResponse::from(user))
}

/// PUT /profile — updates username and/or email.
#[tracing::instrument(skip_all)]
pub async fn update_profile<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let updated = state
        .accounts
        .update_profile(
            user.id,
            ProfileUpdate {
                username: req.username,
                email: req.email,
            },
        )
        .await?;
    Ok(Json(ProfileResponse::from(updated)))
}

/// POST /profile/change-password — replaces the caller's password.
#[tracing::instrument(skip_all)]
pub async fn change_password<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (Some(old_password), Some(new_password)) = (req.old_password, req.new_password) else {
        return Err(ApiError::missing_data());
    };

    state
        .accounts
        .change_password(user.id, old_password, new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}
