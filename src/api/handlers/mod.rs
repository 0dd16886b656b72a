//! API request handlers.
//!
//! This module contains all HTTP request handlers organized by functionality.

/// Service health handler.
pub mod health;
/// Research session handlers (streaming and blocking).
pub mod research;
