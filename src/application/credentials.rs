// src/application/credentials.rs
use crate::application::{
    ApplicationResult,
    ports::storage::{DurableStore, KeyValueStore},
};
use crate::domain::session::{Session, TokenSet, UserProfile, value_objects::parse_instant};
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::warn;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const ACCESS_EXPIRES_AT_KEY: &str = "access_expires_at";
pub const USER_KEY: &str = "user";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const REFRESH_EXPIRES_AT_KEY: &str = "refresh_expires_at";

const SHORT_LIVED_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, ACCESS_EXPIRES_AT_KEY, USER_KEY];
const DURABLE_KEYS: [&str; 2] = [REFRESH_TOKEN_KEY, REFRESH_EXPIRES_AT_KEY];

/// The only path to persisted credentials. Access material lives in the
/// short-lived (per tab) store, refresh material in the durable one.
pub struct CredentialStore {
    short_lived: Arc<dyn KeyValueStore>,
    durable: Arc<dyn DurableStore>,
    // Writers take it shared, clear_all exclusive.
    gate: RwLock<()>,
}

impl CredentialStore {
    pub fn new(short_lived: Arc<dyn KeyValueStore>, durable: Arc<dyn DurableStore>) -> Self {
        Self {
            short_lived,
            durable,
            gate: RwLock::new(()),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.short_lived.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.durable.get(REFRESH_TOKEN_KEY)
    }

    pub fn access_expires_at(&self) -> Option<DateTime<Utc>> {
        self.short_lived
            .get(ACCESS_EXPIRES_AT_KEY)
            .as_deref()
            .and_then(parse_instant)
    }

    pub fn refresh_expires_at(&self) -> Option<DateTime<Utc>> {
        self.durable
            .get(REFRESH_EXPIRES_AT_KEY)
            .as_deref()
            .and_then(parse_instant)
    }

    /// Writes the access token and, when present, the refresh token.
    pub fn set_tokens(&self, access: &str, refresh: Option<&str>) -> ApplicationResult<()> {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.short_lived.set(ACCESS_TOKEN_KEY, access)?;
        if let Some(refresh) = refresh {
            self.durable.set(REFRESH_TOKEN_KEY, refresh)?;
        }
        Ok(())
    }

    /// A missing access expiry clears the stored one; a missing refresh
    /// expiry keeps it.
    pub fn set_token_expiry(
        &self,
        access_expires_at: Option<DateTime<Utc>>,
        refresh_expires_at: Option<DateTime<Utc>>,
    ) -> ApplicationResult<()> {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        match access_expires_at {
            Some(at) => self.short_lived.set(ACCESS_EXPIRES_AT_KEY, &format_instant(at))?,
            None => self.short_lived.remove(ACCESS_EXPIRES_AT_KEY)?,
        }
        if let Some(at) = refresh_expires_at {
            self.durable.set(REFRESH_EXPIRES_AT_KEY, &format_instant(at))?;
        }
        Ok(())
    }

    pub fn store_token_set(&self, tokens: &TokenSet) -> ApplicationResult<()> {
        self.set_tokens(&tokens.access, tokens.refresh.as_deref())?;
        self.set_token_expiry(tokens.access_expires_at, tokens.refresh_expires_at)
    }

    /// The cached user, or `None` when absent or unreadable.
    pub fn user(&self) -> Option<UserProfile> {
        let raw = self.short_lived.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(err) => {
                warn!(error = %err, "discarding unreadable cached user");
                None
            }
        }
    }

    pub fn set_user(&self, user: &UserProfile) -> ApplicationResult<()> {
        let raw = serde_json::to_string(user).map_err(crate::domain::errors::DomainError::from)?;
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.short_lived.set(USER_KEY, &raw)
    }

    pub fn clear_tokens(&self) -> ApplicationResult<()> {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.short_lived.remove(ACCESS_TOKEN_KEY)?;
        self.durable.remove(REFRESH_TOKEN_KEY)
    }

    pub fn clear_token_expiry(&self) -> ApplicationResult<()> {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.short_lived.remove(ACCESS_EXPIRES_AT_KEY)?;
        self.durable.remove(REFRESH_EXPIRES_AT_KEY)
    }

    pub fn clear_user(&self) -> ApplicationResult<()> {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        self.short_lived.remove(USER_KEY)
    }

    /// Removes every credential key. No other write interleaves with it.
    /// Every key is attempted even if an earlier removal fails; the first
    /// failure is reported.
    pub fn clear_all(&self) -> ApplicationResult<()> {
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let short_lived = SHORT_LIVED_KEYS.iter().map(|key| self.short_lived.remove(key));
        let durable = DURABLE_KEYS.iter().map(|key| self.durable.remove(key));
        short_lived
            .chain(durable)
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<ApplicationResult<Vec<()>>>()
            .map(|_| ())
    }

    /// Reassembles the session persisted by this tab and its siblings.
    pub fn load_session(&self) -> Session {
        Session {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            access_expires_at: self.access_expires_at(),
            refresh_expires_at: self.refresh_expires_at(),
            user: self.user(),
            pending_email: None,
        }
    }
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
