//! The external REST/admin subsystem: an in-memory SIM + session-token
//! store, fronted by a small `axum` HTTP surface, implementing
//! `cardlink_tunnel::registry::SimRegistry`. The tunnel core only ever
//! reaches this crate through that trait.

pub mod http;
pub mod registry_impl;
pub mod store;

pub use registry_impl::Registry;
pub use store::Store;
