//! # Route Modules
//!
//! Each module exposes `router()` returning a `Router<AppState>`; they are
//! merged in [`crate::app`].

pub mod documents;
pub mod folios;
pub mod notices;
