// src/application/services/auth.rs
use crate::application::{
    ApplicationError, ApplicationResult,
    dto::{EmailUpdateDto, EmailVerificationDto, LoginDto},
    endpoints,
    pipeline::ApiClient,
    ports::http::HttpRequest,
    session::SessionStore,
};
use crate::domain::session::{ProfilePatch, UserProfile};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

pub struct LoginResult {
    pub user: UserProfile,
    pub is_new_user: bool,
}

/// Magic-link authentication and profile management.
pub struct AuthService {
    client: Arc<ApiClient>,
    session: Arc<SessionStore>,
}

impl AuthService {
    pub fn new(client: Arc<ApiClient>, session: Arc<SessionStore>) -> Self {
        Self { client, session }
    }

    pub async fn request_magic_link(&self, email: &str) -> ApplicationResult<()> {
        let email = validate_email(email)?;
        self.client
            .send(HttpRequest::post(endpoints::MAGIC_LINK_REQUEST).json(json!({ "email": email })))
            .await?;
        info!("magic link requested");
        Ok(())
    }

    pub async fn verify_magic_link(&self, token: &str) -> ApplicationResult<LoginResult> {
        let token = require("token", token)?;
        let LoginDto {
            user,
            tokens,
            is_new_user,
        } = self
            .client
            .send_data(HttpRequest::post(endpoints::MAGIC_LINK_VERIFY).json(json!({ "token": token })))
            .await?;
        self.session.login(user.clone(), tokens)?;
        Ok(LoginResult { user, is_new_user })
    }

    /// Refreshes the cached profile. Other tabs are not told; they fetch
    /// their own.
    pub async fn fetch_profile(&self) -> ApplicationResult<UserProfile> {
        let profile: UserProfile = self.client.send_data(HttpRequest::get(endpoints::PROFILE)).await?;
        self.session.record_profile(&profile)?;
        Ok(profile)
    }

    pub async fn update_profile(&self, patch: ProfilePatch) -> ApplicationResult<UserProfile> {
        if patch.is_empty() {
            return Err(ApplicationError::validation("at least one field must be provided"));
        }
        let updated: Value = self
            .client
            .send_data(HttpRequest::put(endpoints::PROFILE).json(patch.into_value()))
            .await?;
        self.session.update_profile(ProfilePatch::from_value(updated)?)?;
        self.session
            .user()
            .ok_or_else(|| ApplicationError::unauthorized("no active session"))
    }

    /// Starts an email change. The new address stays pending until verified.
    pub async fn update_email(&self, new_email: &str) -> ApplicationResult<EmailUpdateDto> {
        let new_email = validate_email(new_email)?;
        let result: EmailUpdateDto = self
            .client
            .send_data(
                HttpRequest::post(endpoints::EMAIL_UPDATE).json(json!({ "new_email": new_email })),
            )
            .await?;
        if let Some(pending) = &result.pending_email {
            self.session.set_pending_email(Some(pending.clone()));
        }
        debug!(requires_relogin = result.requires_relogin, "email change requested");
        Ok(result)
    }

    pub async fn verify_email(&self, token: &str) -> ApplicationResult<EmailVerificationDto> {
        let token = require("token", token)?;
        let result: EmailVerificationDto = self
            .client
            .send_data(HttpRequest::post(endpoints::EMAIL_VERIFY).json(json!({ "token": token })))
            .await?;
        if self.session.user().is_some() {
            self.session
                .confirm_email(result.email.clone(), result.tokens.clone())?;
        }
        info!("email verified");
        Ok(result)
    }

    pub async fn resend_verification(&self) -> ApplicationResult<()> {
        self.client.send(HttpRequest::post(endpoints::EMAIL_RESEND)).await?;
        Ok(())
    }

    pub async fn user_stats(&self) -> ApplicationResult<Value> {
        self.client.send_data(HttpRequest::get(endpoints::USER_STATS)).await
    }

    /// Revokes the refresh token server-side when possible. The local session
    /// is cleared and other tabs are told regardless of the server's answer.
    pub async fn logout(&self) -> ApplicationResult<()> {
        if let Some(refresh) = self.session.snapshot().refresh_token {
            let request = HttpRequest::post(endpoints::LOGOUT).json(json!({ "refresh": refresh }));
            if let Err(err) = self.client.send(request).await {
                debug!(error = %err, "server logout failed; clearing local session anyway");
            }
        }
        self.session.logout()
    }
}

fn require<'a>(field: &str, value: &'a str) -> ApplicationResult<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApplicationError::validation(format!("{field} cannot be empty")));
    }
    Ok(value)
}

fn validate_email(email: &str) -> ApplicationResult<&str> {
    let email = require("email", email)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApplicationError::validation("Please enter a valid email address")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert_eq!(validate_email("  a@example.com ").unwrap(), "a@example.com");
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("a@localhost").is_err());
    }
}
