// src/application/dto/auth.rs
use crate::domain::session::{TokenSet, UserProfile};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginDto {
    pub user: UserProfile,
    pub tokens: TokenSet,
    #[serde(default)]
    pub is_new_user: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshDto {
    pub tokens: TokenSet,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailUpdateDto {
    #[serde(default)]
    pub pending_email: Option<String>,
    #[serde(default)]
    pub requires_relogin: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmailVerificationDto {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub tokens: Option<TokenSet>,
    #[serde(default)]
    pub is_email_verified: bool,
}
