//! Auth handshake, SIM rendezvous and the dual provider/probe listener.
//!
//! This crate owns everything between an accepted TCP connection and a
//! running relay: the auth handshake (C3), the `SimRegistry` boundary
//! trait it calls into (C4), the match engine that pairs a probe's
//! `ConnectRequest` with a parked provider (C5), the provider and probe
//! per-connection state machines, and the listener that ties both
//! sides together (C7). `cardlink-registry` provides the `SimRegistry`
//! impl; `cardlink` wires everything into a running binary.

pub mod auth;
pub mod error;
pub mod listener;
pub mod match_engine;
pub mod probe;
pub mod provider;
pub mod registry;
pub mod tls;

pub use error::TunnelError;
pub use listener::{TunnelServer, TunnelServerOpts};
pub use match_engine::MatchEngine;
pub use registry::{RegistryError, SimRegistry};
