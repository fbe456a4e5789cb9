//! The core infrastructure needed to configure and run the simulator: the [`controller`]
//! orchestrates the simulation lifecycle, [`host_registry`] expands the configuration into
//! concrete hosts and processes, and [`manager`] defines the boundary it drives through.

pub mod controller;
pub mod host_registry;
pub mod manager;
