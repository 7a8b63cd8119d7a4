//! Facility routing decision engine.
//!
//! Resolves a candidate pool for a clinical service request, scores it with fixed weights,
//! breaks ties deterministically, and assembles a decision record with a calibrated confidence.

pub mod config;
pub mod error;
pub mod routing;
pub mod telemetry;
