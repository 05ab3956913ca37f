// src/domain/session/entity.rs
use crate::domain::errors::DomainResult;
use crate::domain::session::value_objects::{ProfilePatch, TokenSet, UserProfile};
use chrono::{DateTime, Duration, Utc};

/// In-memory view of the signed-in user. Authentication is derived from the
/// presence of an access token and never stored separately.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub access_expires_at: Option<DateTime<Utc>>,
    pub refresh_expires_at: Option<DateTime<Utc>>,
    pub user: Option<UserProfile>,
    pub pending_email: Option<String>,
}

impl Session {
    pub fn established(tokens: &TokenSet, user: Option<UserProfile>) -> Self {
        let mut session = Self {
            user,
            ..Self::default()
        };
        session.apply_tokens(tokens);
        session
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    /// Replaces token material. A token set without a refresh token keeps the
    /// current one.
    pub fn apply_tokens(&mut self, tokens: &TokenSet) {
        self.access_token = Some(tokens.access.clone());
        if let Some(refresh) = &tokens.refresh {
            self.refresh_token = Some(refresh.clone());
        }
        self.access_expires_at = tokens.access_expires_at;
        if tokens.refresh_expires_at.is_some() {
            self.refresh_expires_at = tokens.refresh_expires_at;
        }
    }

    /// Merges into the cached user. Returns `false` when there is no user.
    pub fn merge_user(&mut self, patch: &ProfilePatch) -> DomainResult<bool> {
        match self.user.as_mut() {
            Some(user) => {
                user.merge(patch)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// True when the access token expires within `threshold` of `now`, or has
    /// already expired. Without a known expiry no refresh is scheduled.
    pub fn refresh_due(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        match (self.access_token.as_ref(), self.access_expires_at) {
            (Some(_), Some(expires_at)) => expires_at - now <= threshold,
            _ => false,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
