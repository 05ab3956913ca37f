// src/application/pipeline/mod.rs
pub mod classify;
pub mod client;
pub mod config;
pub mod inbound;

pub use client::{ApiClient, decode_data};
pub use config::{PipelineConfig, SilentErrorCodes};
pub use inbound::ResponseInterceptor;
