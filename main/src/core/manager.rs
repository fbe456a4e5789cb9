//! The boundary between the Controller and its out-of-scope collaborator: the worker/manager
//! subsystem that actually schedules per-host events and runs virtual processes.
//!
//! Neither a scheduler nor an event queue lives in this crate — only the trait the Controller
//! calls through, and (under `#[cfg(test)]`) a minimal mock used to exercise the Controller's
//! lifecycle end-to-end.

use std::net::IpAddr;
use std::path::Path;

use crate::core::host_registry::HostParameters;
use crate::error::ControllerError;
use crate::network::dns::Dns;
use crate::support::simulation_time::SimulationTime;

/// Query API the Controller exposes to its Manager collaborator. Every method here may be
/// called concurrently from worker threads (see the concurrency model in the top-level design).
pub trait SimController {
    fn get_dns(&self) -> &Dns;
    fn get_latency(&self, src: IpAddr, dst: IpAddr) -> Result<f64, ControllerError>;
    fn get_reliability(&self, src: IpAddr, dst: IpAddr) -> Result<f32, ControllerError>;
    fn is_routable(&self, src: IpAddr, dst: IpAddr) -> bool;
    fn increment_packet_count(&self, src: IpAddr, dst: IpAddr);
    /// Returns `(window_start, window_end, keep_running)`.
    fn manager_finished_current_round(
        &self,
        min_next_event_time: SimulationTime,
    ) -> (SimulationTime, SimulationTime, bool);
    fn update_min_time_jump(&self, observed_min_path_latency_ms: f64);
}

/// The manager subsystem that the Controller instantiates hosts and processes through, and
/// finally hands control to for the duration of the run.
pub trait Manager {
    fn add_new_virtual_host(&self, params: HostParameters) -> Result<(), ControllerError>;

    #[allow(clippy::too_many_arguments)]
    fn add_new_virtual_process(
        &self,
        hostname: &str,
        path: &Path,
        args: &[String],
        environment: &str,
        start_time: SimulationTime,
        stop_time: SimulationTime,
    ) -> Result<(), ControllerError>;

    /// The raw CPU frequency the manager measured on its host platform, used to populate
    /// `HostParameters::cpu_frequency_hz`.
    fn cpu_frequency_hz(&self) -> u64;

    /// Runs the simulation to completion, calling back into `controller` for window
    /// advancement and routing queries. Returns once the Controller's window has closed or a
    /// fatal worker error occurred.
    fn run(&self, controller: &dyn SimController) -> Result<(), ControllerError>;
}
