//! Exam Portal Backend Library
//!
//! Authentication, role authorization and user management for the
//! examination portal. Exposed as a library for the server binary and tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;

pub use api::create_router;
pub use config::AppConfig;
