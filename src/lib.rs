pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod web;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use lifecycle::{Engine, EngineError, EngineResult, LifecyclePolicy};
