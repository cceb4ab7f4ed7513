//! Adapter to the external protocol-client sidecar.
//!
//! The sidecar owns everything protocol-specific: pairing, encryption,
//! message framing, credential storage. This crate speaks newline-free JSON
//! frames to it over a local WebSocket and translates them into the
//! [`ClientEvent`]s the lifecycle controller consumes.

pub mod sidecar;
pub mod wire;

pub use sidecar::SidecarFactory;
