// src/domain/sync/events.rs
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::session::{ProfilePatch, TokenSet, UserProfile};
use crate::domain::sync::tab::TabId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventKind {
    Logout,
    Login,
    ProfileUpdated,
    EmailUpdated,
    TokenRefreshed,
}

impl SyncEventKind {
    pub const ALL: [Self; 5] = [
        Self::Logout,
        Self::Login,
        Self::ProfileUpdated,
        Self::EmailUpdated,
        Self::TokenRefreshed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Logout => "logout",
            Self::Login => "login",
            Self::ProfileUpdated => "profile_updated",
            Self::EmailUpdated => "email_updated",
            Self::TokenRefreshed => "token_refreshed",
        }
    }
}

impl fmt::Display for SyncEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Logout,
    Login {
        user: Option<UserProfile>,
        tokens: TokenSet,
    },
    ProfileUpdated(ProfilePatch),
    EmailUpdated(ProfilePatch),
    TokenRefreshed(TokenSet),
}

#[derive(Serialize, Deserialize)]
struct LoginPayload {
    #[serde(default)]
    user: Option<UserProfile>,
    tokens: TokenSet,
}

#[derive(Serialize, Deserialize)]
struct TokenPayload {
    tokens: TokenSet,
}

impl SyncEvent {
    pub fn kind(&self) -> SyncEventKind {
        match self {
            Self::Logout => SyncEventKind::Logout,
            Self::Login { .. } => SyncEventKind::Login,
            Self::ProfileUpdated(_) => SyncEventKind::ProfileUpdated,
            Self::EmailUpdated(_) => SyncEventKind::EmailUpdated,
            Self::TokenRefreshed(_) => SyncEventKind::TokenRefreshed,
        }
    }

    fn payload(&self) -> DomainResult<Value> {
        let value = match self {
            Self::Logout => Value::Object(serde_json::Map::new()),
            Self::Login { user, tokens } => serde_json::to_value(LoginPayload {
                user: user.clone(),
                tokens: tokens.clone(),
            })?,
            Self::ProfileUpdated(patch) | Self::EmailUpdated(patch) => patch.clone().into_value(),
            Self::TokenRefreshed(tokens) => serde_json::to_value(TokenPayload {
                tokens: tokens.clone(),
            })?,
        };
        Ok(value)
    }

    fn from_payload(kind: SyncEventKind, payload: Value) -> DomainResult<Self> {
        Ok(match kind {
            SyncEventKind::Logout => Self::Logout,
            SyncEventKind::Login => {
                let LoginPayload { user, tokens } = serde_json::from_value(payload)?;
                Self::Login { user, tokens }
            }
            SyncEventKind::ProfileUpdated => Self::ProfileUpdated(ProfilePatch::from_value(payload)?),
            SyncEventKind::EmailUpdated => Self::EmailUpdated(ProfilePatch::from_value(payload)?),
            SyncEventKind::TokenRefreshed => {
                let TokenPayload { tokens } = serde_json::from_value(payload)?;
                Self::TokenRefreshed(tokens)
            }
        })
    }
}

/// Wire form of a sync event as written to the shared broadcast key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEnvelope {
    #[serde(rename = "type")]
    pub kind: SyncEventKind,
    #[serde(default)]
    pub payload: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(rename = "tabId", alias = "originTabId", alias = "origin_tab_id")]
    pub origin_tab_id: String,
}

impl SyncEnvelope {
    pub fn new(event: &SyncEvent, at: DateTime<Utc>, origin: &TabId) -> DomainResult<Self> {
        Ok(Self {
            kind: event.kind(),
            payload: event.payload()?,
            timestamp: at.timestamp_millis(),
            origin_tab_id: origin.as_str().to_owned(),
        })
    }

    pub fn encode(&self) -> DomainResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> DomainResult<Self> {
        serde_json::from_str(raw).map_err(|err| DomainError::Malformed(format!("sync envelope: {err}")))
    }

    pub fn is_from(&self, tab: &TabId) -> bool {
        self.origin_tab_id == tab.as_str()
    }

    pub fn into_event(self) -> DomainResult<SyncEvent> {
        SyncEvent::from_payload(self.kind, self.payload)
    }
}
