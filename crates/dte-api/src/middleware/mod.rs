//! # Middleware
//!
//! Request-level layers applied around the API routes.

pub mod metrics;
