//! Workspace umbrella crate.
//!
//! Re-exports the stream service behind the `desktop-shims` feature so hosts
//! can depend on `mpc-workspace` alone.

#[cfg(feature = "desktop-shims")]
pub use core_service;
