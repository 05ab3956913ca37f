// src/domain/session/value_objects.rs
use crate::domain::errors::{DomainError, DomainResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Token material issued by the auth endpoints.
///
/// The email verification endpoint reports the access expiry as `expires_at`,
/// every other endpoint as `access_expires_at`; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
    #[serde(
        default,
        alias = "expires_at",
        deserialize_with = "lenient_instant",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_expires_at: Option<DateTime<Utc>>,
    #[serde(
        default,
        deserialize_with = "lenient_instant",
        skip_serializing_if = "Option::is_none"
    )]
    pub refresh_expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh,
            access_expires_at: None,
            refresh_expires_at: None,
        }
    }

    #[must_use]
    pub fn with_expiry(
        mut self,
        access_expires_at: Option<DateTime<Utc>>,
        refresh_expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.access_expires_at = access_expires_at;
        self.refresh_expires_at = refresh_expires_at;
        self
    }
}

/// Parses an RFC 3339 instant, treating anything unparseable as "no expiry".
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|value| value.with_timezone(&Utc))
}

fn lenient_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_instant))
}

fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(value) => value,
        RawId::Number(value) => value.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Inactive,
    Locked,
    #[serde(other)]
    Unknown,
}

/// Cached user profile. Fields the client does not interpret are preserved in
/// `extra` so a round trip through storage never drops server data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_status: Option<AccountStatus>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            is_email_verified: false,
            account_status: None,
            extra: Map::new(),
        }
    }

    pub fn display_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.trim().is_empty())
            .collect();
        if parts.is_empty() {
            self.email.clone()
        } else {
            parts.join(" ")
        }
    }

    /// Shallow-merges `patch` over this profile. Keys in the patch win.
    pub fn merge(&mut self, patch: &ProfilePatch) -> DomainResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut merged = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => return Err(DomainError::Malformed("profile is not an object".into())),
        };
        for (key, value) in patch.iter() {
            merged.insert(key.clone(), value.clone());
        }
        *self = serde_json::from_value(Value::Object(merged))?;
        Ok(())
    }
}

/// Partial user fields carried by profile/email updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfilePatch(Map<String, Value>);

impl ProfilePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> DomainResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(DomainError::Validation(format!(
                "profile patch must be an object, got {other}"
            ))),
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<&UserProfile> for ProfilePatch {
    fn from(profile: &UserProfile) -> Self {
        match serde_json::to_value(profile) {
            Ok(Value::Object(map)) => Self(map),
            _ => Self::default(),
        }
    }
}
