// src/domain/session/mod.rs
pub mod entity;
pub mod value_objects;

pub use entity::Session;
pub use value_objects::{AccountStatus, ProfilePatch, TokenSet, UserProfile};
