pub mod credentials;
pub mod dto;
pub mod endpoints;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod refresh;
pub mod services;
pub mod session;
pub mod sync;
pub mod upload;

pub use error::{ApplicationError, ApplicationResult};
