//! Core domain types
//!
//! This module contains the domain structures used across the Helmsman
//! crates. These types represent the pipeline's own view of the world,
//! independent of the wire formats of the external services.

pub mod build;
pub mod notification;
pub mod pipeline;
pub mod plan;
pub mod stage;
