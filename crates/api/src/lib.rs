//! HTTP layer: configuration, sessions, middleware and routing.

pub mod app;
pub mod config;
pub mod middleware;
pub mod session;
