// src/domain/sync/tab.rs
use crate::domain::errors::{DomainError, DomainResult};
use std::fmt;
use uuid::Uuid;

const TAB_ID_PREFIX: &str = "tab_";

/// Identity of one running client instance ("tab") sharing durable storage
/// with its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabId(String);

impl TabId {
    pub fn generate() -> Self {
        Self(format!("{TAB_ID_PREFIX}{}", Uuid::new_v4().simple()))
    }

    pub fn parse(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::Validation("tab id cannot be empty".into()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
