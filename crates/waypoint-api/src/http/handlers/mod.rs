//! REST API request handlers.

pub mod application;
