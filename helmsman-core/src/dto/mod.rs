//! Data transfer objects
//!
//! Wire payloads for the three HTTP services the pipeline talks to. Field
//! names follow the foreign APIs, renamed where they differ from Rust
//! conventions; domain code should convert these at the client boundary
//! rather than carry them around.

pub mod analyzer;
pub mod build;
pub mod monitor;
