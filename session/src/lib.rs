//! GM and preview sessions for the fog-of-war map tool.
//!
//! A session owns one loaded map's live state (camera, grid, fog, pending
//! edits) and drives it against the persistent store. The GM side batches
//! local fog edits and reconciles with the store under a staleness throttle;
//! the preview side follows the store and consumes navigation commands for
//! its own independent camera.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | Timing and brush settings, environment overrides |
//! | [`error`] | `SessionError` |
//! | [`store`] | Store capability traits (fog, map config, navigation, telemetry) |
//! | [`http`] | `reqwest` implementation of the store traits |
//! | [`sync`] | Edit batching, flush bookkeeping, reconciliation throttle |
//! | [`gm`] | GM session context |
//! | [`tokens`] | Player and enemy markers |
//! | [`preview`] | Preview session context |
//! | [`runtime`] | Event loops tying sessions to the store |

pub mod config;
pub mod error;
pub mod gm;
pub mod http;
pub mod preview;
pub mod runtime;
pub mod store;
pub mod sync;
pub mod tokens;

pub use config::SessionConfig;
pub use error::SessionError;
pub use gm::GmSession;
pub use http::HttpBackend;
pub use preview::PreviewSession;
pub use runtime::{GmBackends, GmEvent, GmRuntime, PreviewExit, PreviewRuntime, PreviewUpdate};
pub use sync::SyncEngine;
