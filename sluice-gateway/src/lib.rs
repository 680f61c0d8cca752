//! Sluice Gateway Client
//!
//! HTTP clients for remote job submission: the [`ClusterGateway`] trait and
//! its reqwest-backed implementation, plus a thin direct-to-cluster control
//! client for out-of-band cancel/savepoint by job id.
//!
//! Every gateway operation resolves into a normalized outcome with a success
//! flag, assigned ids, endpoint address, and error text; transport failures
//! surface as [`GatewayError`] instead.

pub mod client;
pub mod control;
pub mod error;
pub mod http;
mod outcome;

// Re-export commonly used types
pub use client::{ClusterGateway, SavepointKind};
pub use control::ClusterControl;
pub use error::{GatewayError, Result};
pub use http::HttpGateway;
pub use outcome::{ConnectionProbe, GatewayOutcome, SavepointOutcome};
