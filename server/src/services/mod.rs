//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own map state and persistence concerns so route handlers
//! can stay focused on protocol translation and status mapping.

pub mod fog;
pub mod map_config;
pub mod persistence;
pub mod preview;
