//! Sluice Core
//!
//! Core types and abstractions for the Sluice job orchestration system.
//!
//! This crate contains the domain types shared between the orchestrator and
//! the gateway client: the job entity and its lifecycle, submission
//! configuration, classified statements, typed results, and the compiled-plan
//! representation handed to submission targets.

pub mod domain;
