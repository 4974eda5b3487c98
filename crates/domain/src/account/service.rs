use common::UserId;
use store::{NewUser, ProfileUpdate, Store, StoreExt, User};

use super::{TokenConfig, decode_token, hash_password, issue_token, verify_password};
use crate::error::{DomainError, Result};

/// Input for `AccountService::register`.
#[derive(Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// A freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct LoginToken {
    pub token: String,
    pub user_id: UserId,
}

/// Service for user accounts and credential resolution.
#[derive(Debug, Clone)]
pub struct AccountService<S> {
    store: S,
    tokens: TokenConfig,
}

impl<S: Store> AccountService<S> {
    pub fn new(store: S, tokens: TokenConfig) -> Self {
        Self { store, tokens }
    }

    /// Registers a new user.
    #[tracing::instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<User> {
        let Registration {
            username,
            email,
            password,
        } = registration;
        let username = username.trim().to_string();
        let email = email.trim().to_string();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(DomainError::validation("Missing data"));
        }
        validate_email(&email)?;

        let password_hash = hash_password(password).await?;
        let user = self
            .store
            .create_user(NewUser {
                username,
                email,
                password_hash,
            })
            .await?;

        metrics::counter!("users_registered_total").increment(1);
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Checks an email/password pair and issues a bearer token.
    ///
    /// Unknown email and wrong password fail identically.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: String) -> Result<LoginToken> {
        let user = match self.store.find_user_by_email(email.trim()).await? {
            Some(user) => user,
            None => return Err(self.login_failed()),
        };

        if !verify_password(password, user.password_hash).await? {
            return Err(self.login_failed());
        }

        let token = issue_token(user.id, &self.tokens)?;
        Ok(LoginToken {
            token,
            user_id: user.id,
        })
    }

    fn login_failed(&self) -> DomainError {
        metrics::counter!("logins_failed_total").increment(1);
        DomainError::InvalidCredentials
    }

    #[tracing::instrument(skip(self))]
    pub async fn profile(&self, user_id: UserId) -> Result<User> {
        Ok(self.store.require_user(user_id).await?)
    }

    /// Applies the supplied profile fields.
    #[tracing::instrument(skip(self))]
    pub async fn update_profile(&self, user_id: UserId, update: ProfileUpdate) -> Result<User> {
        let update = ProfileUpdate {
            username: non_blank(update.username, "Username")?,
            email: non_blank(update.email, "Email")?,
        };
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        if update.is_empty() {
            return self.profile(user_id).await;
        }

        Ok(self.store.update_profile(user_id, update).await?)
    }

    /// Replaces the password after checking the current one.
    ///
    /// A wrong `old_password` leaves the stored hash untouched.
    #[tracing::instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: UserId,
        old_password: String,
        new_password: String,
    ) -> Result<()> {
        if old_password.is_empty() || new_password.is_empty() {
            return Err(DomainError::validation("Missing data"));
        }

        let user = self.store.require_user(user_id).await?;
        if !verify_password(old_password, user.password_hash).await? {
            return Err(DomainError::InvalidCredentials);
        }

        let password_hash = hash_password(new_password).await?;
        self.store.set_password_hash(user_id, password_hash).await?;
        tracing::info!(%user_id, "Password changed");
        Ok(())
    }

    /// Resolves a bearer token to its user.
    #[tracing::instrument(skip_all)]
    pub async fn authenticate_token(&self, token: &str) -> Result<User> {
        let claims = decode_token(token, &self.tokens)?;
        let user_id: UserId = claims
            .sub
            .parse()
            .map_err(|_| DomainError::unauthenticated("Token is invalid"))?;

        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| DomainError::unauthenticated("Token is invalid"))
    }

    /// Resolves a raw user id header value to its user.
    #[tracing::instrument(skip(self))]
    pub async fn authenticate_user_id(&self, raw: &str) -> Result<User> {
        let user_id: UserId = raw
            .parse()
            .map_err(|_| DomainError::unauthenticated("Invalid user ID"))?;

        self.store
            .get_user(user_id)
            .await?
            .ok_or_else(|| DomainError::unauthenticated("Invalid user ID"))
    }
}

fn validate_email(email: &str) -> Result<()> {
    if email.contains('@') {
        Ok(())
    } else {
        Err(DomainError::validation("Invalid email address"))
    }
}

fn non_blank(value: Option<String>, field: &str) -> Result<Option<String>> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Err(DomainError::validation(format!("{field} cannot be empty"))),
        other => Ok(other),
    }
}
