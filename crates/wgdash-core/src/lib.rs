//! wgdash-core: primitives for administering a WireGuard gateway host.
//!
//! Everything here treats two things as the only sources of truth: the
//! server's `.conf` file on disk and the live state reported by the `wg`
//! binary. Every read recomputes derived state from scratch, so there is no
//! cache to invalidate and no lock to hold. Concurrent mutations of the
//! config file race last-writer-wins; acceptable for a single-admin tool.

pub mod conf;
pub mod error;
pub mod exec;
pub mod gateway;
pub mod provision;
pub mod qr;
pub mod status;
pub mod system;

pub use error::GatewayError;
