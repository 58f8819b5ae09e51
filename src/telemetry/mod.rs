//! # Telemetry Module
//!
//! Moves readings from onboard sources to a collector.
//!
//! This module handles:
//! - Collaborator capabilities (sensor board, GPS, network sink, pacing)
//! - The wait-gated poll loop for sensor and GPS stations
//! - Relaying received radio frames on the comm station

pub mod poller;
pub mod relay;
pub mod sources;
