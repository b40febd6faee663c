//! Apple Counter client
//!
//! Uploads an orchard video to the apple counting service, follows the
//! resulting analysis job through polling, and exposes the session state
//! (idle, uploading, processing, completed, error) to a front end.

pub mod app_state;
pub mod config;
pub mod models;
pub mod services;

pub use app_state::{ActivityKind, Session};
pub use config::{AppConfig, SessionConfig};
