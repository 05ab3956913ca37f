// src/domain/mod.rs
pub mod errors;
pub mod session;
pub mod sync;
pub mod upload;
