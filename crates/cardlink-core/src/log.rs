//! Logging re-exports.
//!
//! `tracing`'s default target is already the full module path, which
//! starts with the crate name, so `cardlink::log::init_log` can filter
//! per crate (`cardlink_core`, `cardlink_tunnel`, `cardlink_registry`)
//! with a plain `tracing_subscriber::filter::Targets` layer, no
//! compile-time target rewriting needed.

pub use tracing::{debug, error, info, trace, warn};
