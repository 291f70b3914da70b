pub mod config;
pub mod error;
pub mod session;
pub mod tiktok_api;
pub mod util;
pub mod web;

pub use config::{ApiConfig, Config};
pub use error::PostError;
pub use tiktok_api::ApiClient;
