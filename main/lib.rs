//! Core of a discrete-event network simulator: owns the simulation clock, drives
//! bounded-lookahead time windows across a Manager's workers, and builds the virtual network
//! (topology, address assignment, routing, DNS) the simulated hosts run on.
//!
//! This crate has no CLI surface of its own; see `bin/main.rs` for a minimal wrapper that loads
//! a configuration and constructs a [`core::controller::Controller`] for smoke-testing.

pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod support;
pub mod utility;
