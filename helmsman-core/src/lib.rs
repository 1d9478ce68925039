//! Helmsman Core
//!
//! Core types and abstractions for the Helmsman change pipeline.
//!
//! This crate contains:
//! - Domain types: Core business entities (stages, builds, notifications)
//! - DTOs: Wire payloads exchanged with the external services

pub mod domain;
pub mod dto;
