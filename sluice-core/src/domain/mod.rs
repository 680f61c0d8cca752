//! Core domain types
//!
//! This module contains the domain structures used across Sluice crates.
//! These types represent one submission's fundamental entities and are shared
//! between the orchestrator (which drives the lifecycle) and the gateway
//! client (which reports remote outcomes).

pub mod config;
pub mod job;
pub mod plan;
pub mod result;
pub mod statement;
