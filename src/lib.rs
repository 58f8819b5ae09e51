//! # Fieldlink Library
//!
//! Field telemetry agent for single-board computers.
//!
//! This library provides the communication layer of the agent: finding the
//! USB radio among the host's serial devices, exchanging line-framed JSON
//! over it, and polling onboard sources into a collector.

pub mod config;
pub mod error;
pub mod logging;
pub mod serial;
pub mod station;
pub mod telemetry;
