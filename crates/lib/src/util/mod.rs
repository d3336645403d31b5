//! Shared utilities.
//!
//! Filesystem helpers and hashing used across the orchestrator phases.

pub mod files;
pub mod hash;

#[cfg(test)]
pub mod testutil;
