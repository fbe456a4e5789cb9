//! Orchestrates the simulation lifecycle: loads the network topology, registers hosts with the
//! Manager, computes routing, and then drives the Manager through bounded-lookahead time
//! windows until the simulation's end time is reached.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::ConfigOptions;
use crate::core::host_registry;
use crate::core::manager::{Manager, SimController};
use crate::error::ControllerError;
use crate::network::dns::{Dns, DnsBuilder};
use crate::network::graph::NetworkGraph;
use crate::network::ip_assignment::IpAssignment;
use crate::network::routing_info::RoutingInfo;
use crate::support::simulation_time::SimulationTime;
use crate::support::units::{self, Unit};

/// The minimum lookahead floor used whenever no smaller topology-derived minimum has been
/// observed yet — mirrors the original source's hardcoded 10ms default.
const DEFAULT_MIN_TIME_JUMP: SimulationTime = SimulationTime::from_millis(10);

fn time_to_simtime(t: units::Time<units::TimePrefix>) -> SimulationTime {
    SimulationTime::from_nanos(t.convert(units::TimePrefix::Nano).unwrap().value())
}

/// The top-level Controller. Borrows the configuration for its entire lifetime; owns
/// everything else it constructs (graph, IP pool, routing, DNS, scheduling state).
pub struct Controller<'a> {
    config: &'a ConfigOptions,
    random: Xoshiro256PlusPlus,

    graph: Option<NetworkGraph>,
    ip_assignment: IpAssignment<String>,
    routing_info: Option<RoutingInfo>,
    dns: Dns,

    scheduling: RwLock<Scheduling>,
    // an AtomicU64 encoding of the packet-latency floor observed mid-window; committed into
    // `scheduling.min_jump_time` at the next window boundary (see `update_min_time_jump`)
    next_min_jump_time_ns: AtomicU64,
}

struct Scheduling {
    min_jump_time_config: SimulationTime,
    min_jump_time: SimulationTime,
    execute_window_start: SimulationTime,
    execute_window_end: SimulationTime,
    end_time: SimulationTime,
    #[allow(dead_code)]
    bootstrap_end_time: SimulationTime,
}

impl<'a> Controller<'a> {
    /// Constructs a Controller from an already-parsed configuration. Performs no I/O and emits
    /// no log message: the topology graph is not read until `run` is called, which is when the
    /// `Created` -> `Loading` transition actually happens.
    pub fn new(config: &'a ConfigOptions) -> Result<Self, ControllerError> {
        let random = Xoshiro256PlusPlus::seed_from_u64(config.general.seed);

        let min_jump_time_config = config
            .general
            .runahead
            .map(time_to_simtime)
            .unwrap_or(SimulationTime::ZERO);
        let end_time = time_to_simtime(config.general.stop_time);
        let bootstrap_end_time = time_to_simtime(config.general.bootstrap_end_time);

        Ok(Self {
            config,
            random,
            graph: None,
            ip_assignment: IpAssignment::new(),
            routing_info: None,
            dns: DnsBuilder::new().into_dns(),
            scheduling: RwLock::new(Scheduling {
                min_jump_time_config,
                min_jump_time: SimulationTime::ZERO,
                execute_window_start: SimulationTime::ZERO,
                execute_window_end: SimulationTime::ZERO,
                end_time,
                bootstrap_end_time,
            }),
            next_min_jump_time_ns: AtomicU64::new(0),
        })
    }

    /// Loading + Registering + Routing + Running. Consumes the Controller: once `run` returns
    /// there is nothing left to reuse (the Manager has taken the only window it will ever get).
    pub fn run<M: Manager>(mut self, manager: &M) -> Result<(), ControllerError> {
        // Loading
        let graph_text = std::fs::read_to_string(&self.config.network.graph_path)
            .map_err(|e| ControllerError::Topology(format!("failed to read graph file: {e}")))?;
        let graph = NetworkGraph::parse(&graph_text)
            .map_err(|e| ControllerError::Topology(e.to_string()))?;
        self.graph = Some(graph);
        log::info!("Controller loaded network graph; seed = {}", self.config.general.seed);

        // Registering
        let mut dns_builder = DnsBuilder::new();
        {
            let graph = self.graph.as_ref().expect("graph not yet released");
            host_registry::register_hosts(
                self.config,
                graph,
                manager,
                &mut self.random,
                &mut self.ip_assignment,
                &mut dns_builder,
            )?;
        }
        self.dns = dns_builder.into_dns();

        // Routing
        let nodes = self.ip_assignment.used_nodes();
        let graph = self.graph.as_ref().expect("graph not yet released");
        let node_paths = if self.config.network.use_shortest_path {
            graph.compute_shortest_paths(&nodes)
        } else {
            graph.get_direct_paths(&nodes)
        }
        .map_err(|e| ControllerError::Topology(e.to_string()))?;
        let routing_info = RoutingInfo::new(node_paths);
        routing_info
            .get_smallest_latency_ns()
            .ok_or_else(|| ControllerError::Topology("no routable node pairs".to_string()))?;
        self.routing_info = Some(routing_info);
        // the graph is no longer needed once routing has been computed
        self.graph = None;

        self.initialize_time_windows();

        // Running
        log::info!("Running simulation");
        manager.run(&self)?;
        log::info!("Finished simulation");

        Ok(())
    }

    fn initialize_time_windows(&self) {
        let mut scheduling = self.scheduling.write().unwrap();
        if self.config.general.workers > 0 {
            scheduling.execute_window_start = SimulationTime::ZERO;
            scheduling.execute_window_end =
                get_min_time_jump(SimulationTime::ZERO, scheduling.min_jump_time_config);
        } else {
            scheduling.execute_window_start = SimulationTime::ZERO;
            scheduling.execute_window_end = SimulationTime::MAX;
        }
    }

    fn node_for_ip(&self, ip: IpAddr) -> Option<petgraph::graph::NodeIndex> {
        let IpAddr::V4(ip) = ip else { return None };
        self.ip_assignment.lookup_node(ip)
    }
}

/// `max(min_jump_time if >0 else 10ms, min_jump_time_config)`.
fn get_min_time_jump(
    min_jump_time: SimulationTime,
    min_jump_time_config: SimulationTime,
) -> SimulationTime {
    let floor = if min_jump_time.is_positive() {
        min_jump_time
    } else {
        DEFAULT_MIN_TIME_JUMP
    };
    std::cmp::max(floor, min_jump_time_config)
}

impl SimController for Controller<'_> {
    fn get_dns(&self) -> &Dns {
        &self.dns
    }

    fn get_latency(&self, src: IpAddr, dst: IpAddr) -> Result<f64, ControllerError> {
        let src_node = self
            .node_for_ip(src)
            .ok_or(ControllerError::Unroutable { src, dst })?;
        let dst_node = self
            .node_for_ip(dst)
            .ok_or(ControllerError::Unroutable { src, dst })?;
        let latency_ns = self
            .routing_info
            .as_ref()
            .expect("routing info not yet built")
            .latency_ns(src_node, dst_node)
            .ok_or(ControllerError::Unroutable { src, dst })?;
        Ok(latency_ns as f64 / 1_000_000.0)
    }

    fn get_reliability(&self, src: IpAddr, dst: IpAddr) -> Result<f32, ControllerError> {
        let src_node = self
            .node_for_ip(src)
            .ok_or(ControllerError::Unroutable { src, dst })?;
        let dst_node = self
            .node_for_ip(dst)
            .ok_or(ControllerError::Unroutable { src, dst })?;
        self.routing_info
            .as_ref()
            .expect("routing info not yet built")
            .reliability(src_node, dst_node)
            .ok_or(ControllerError::Unroutable { src, dst })
    }

    fn is_routable(&self, src: IpAddr, dst: IpAddr) -> bool {
        let (Some(src_node), Some(dst_node)) = (self.node_for_ip(src), self.node_for_ip(dst))
        else {
            return false;
        };
        self.routing_info
            .as_ref()
            .expect("routing info not yet built")
            .is_routable(src_node, dst_node)
    }

    fn increment_packet_count(&self, src: IpAddr, dst: IpAddr) {
        let (Some(src_node), Some(dst_node)) = (self.node_for_ip(src), self.node_for_ip(dst))
        else {
            return;
        };
        self.routing_info
            .as_ref()
            .expect("routing info not yet built")
            .increment_packet_count(src_node, dst_node);
    }

    fn manager_finished_current_round(
        &self,
        min_next_event_time: SimulationTime,
    ) -> (SimulationTime, SimulationTime, bool) {
        let mut scheduling = self.scheduling.write().unwrap();

        // commit the observation accumulated since the last window, if any
        let observed = self.next_min_jump_time_ns.load(Ordering::SeqCst);
        if observed > 0 {
            scheduling.min_jump_time = SimulationTime::from_nanos(observed);
        }

        let jump = get_min_time_jump(scheduling.min_jump_time, scheduling.min_jump_time_config);
        let new_start = min_next_event_time;
        let new_end = std::cmp::min(new_start.saturating_add(jump), scheduling.end_time);

        scheduling.execute_window_start = new_start;
        scheduling.execute_window_end = new_end;

        let keep_running = new_start < new_end;
        (new_start, new_end, keep_running)
    }

    fn update_min_time_jump(&self, observed_min_path_latency_ms: f64) {
        let observed_ns = (observed_min_path_latency_ms * 1_000_000.0).round() as u64;
        assert!(observed_ns > 0, "observed path latency must be positive");

        loop {
            let current = self.next_min_jump_time_ns.load(Ordering::SeqCst);
            if current != 0 && observed_ns >= current {
                return;
            }
            if self
                .next_min_jump_time_ns
                .compare_exchange(current, observed_ns, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                log::debug!(
                    "Minimum time jump for the next scheduling round updated from {current} ns to {observed_ns} ns"
                );
                return;
            }
        }
    }
}

impl Drop for Controller<'_> {
    fn drop(&mut self) {
        if self.graph.is_some() {
            log::warn!("network graph was not properly released before the controller was dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::{GeneralOptions, HostOptions, NetworkOptions};
    use crate::core::manager::mock::MockManager;
    use crate::support::units::{SiPrefixUpper, TimePrefix};

    fn graph_text() -> &'static str {
        r#"graph [
            node [ id 0 ]
            node [ id 1 ]
            node [ id 2 ]
            edge [ source 0 target 0 latency "1 ms" ]
            edge [ source 1 target 1 latency "1 ms" ]
            edge [ source 2 target 2 latency "1 ms" ]
            edge [ source 0 target 1 latency "10 ms" packet_loss 0.0 ]
            edge [ source 1 target 2 latency "20 ms" packet_loss 0.1 ]
        ]"#
    }

    fn write_graph() -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(graph_text().as_bytes()).unwrap();
        f
    }

    fn base_config(graph_path: String) -> ConfigOptions {
        ConfigOptions {
            general: GeneralOptions {
                seed: 1,
                stop_time: units::Time::new(1, TimePrefix::Sec),
                bootstrap_end_time: units::Time::default(),
                runahead: None,
                workers: 0,
                log_level: crate::config::LogLevel::Info,
            },
            network: NetworkOptions {
                graph_path,
                use_shortest_path: true,
                socket_send_buffer: None,
                socket_recv_buffer: None,
                socket_send_autotune: false,
                socket_recv_autotune: false,
                interface_buffer: None,
                interface_qdisc: None,
            },
            hosts: BTreeMap::new(),
        }
    }

    fn host(network_node_id: u32) -> HostOptions {
        HostOptions {
            quantity: 1,
            ip_addr: None,
            network_node_id,
            log_level: None,
            heartbeat_log_level: None,
            heartbeat_log_info: Vec::new(),
            heartbeat_interval: None,
            pcap_directory: None,
            bandwidth_down: Some(units::BitsPerSec::new(1, SiPrefixUpper::Mega)),
            bandwidth_up: Some(units::BitsPerSec::new(1, SiPrefixUpper::Mega)),
            processes: Vec::new(),
        }
    }

    #[test]
    fn single_host_idle_run_uses_full_horizon() {
        let graph_file = write_graph();
        let mut config = base_config(graph_file.path().to_string_lossy().into_owned());
        config.hosts.insert("a".to_string(), host(0));

        let controller = Controller::new(&config).unwrap();
        let manager = MockManager::new(vec![]);
        controller.run(&manager).unwrap();

        assert_eq!(manager.hosts.borrow().len(), 1);
        assert!(manager.windows.borrow().is_empty());
    }

    #[test]
    fn two_host_shortest_path_latency_and_reliability() {
        let graph_file = write_graph();
        let mut config = base_config(graph_file.path().to_string_lossy().into_owned());
        config.hosts.insert("a".to_string(), host(0));
        config.hosts.insert("b".to_string(), host(2));

        // registration (and address allocation) is deterministic given the seed and host
        // order, so a first pass discovers the assigned addresses...
        let discovery = Controller::new(&config).unwrap();
        let discovery_manager = MockManager::new(vec![]);
        discovery.run(&discovery_manager).unwrap();
        let hosts = discovery_manager.hosts.borrow();
        let a_ip = hosts.iter().find(|h| h.params.name == "a").unwrap().params.ip_addr;
        let b_ip = hosts.iter().find(|h| h.params.name == "b").unwrap().params.ip_addr;
        drop(hosts);
        assert_ne!(a_ip, b_ip);

        // ...and a second, identically-configured pass queries the routing info for them
        let controller = Controller::new(&config).unwrap();
        let manager = MockManager::with_query(vec![], IpAddr::V4(a_ip), IpAddr::V4(b_ip));
        controller.run(&manager).unwrap();

        let (latency, reliability, routable) = manager.query_result.borrow().unwrap();
        assert!(routable);
        assert!((latency - 30.0).abs() < 1e-6);
        assert!((reliability - 0.9).abs() < 1e-3);
    }

    #[test]
    fn ambiguous_ip_rejects_entire_run() {
        let graph_file = write_graph();
        let mut config = base_config(graph_file.path().to_string_lossy().into_owned());
        let mut h = host(0);
        h.ip_addr = Some(std::net::Ipv4Addr::new(10, 0, 0, 5));
        h.quantity = 3;
        config.hosts.insert("a".to_string(), h);

        let controller = Controller::new(&config).unwrap();
        let manager = MockManager::new(vec![]);
        let err = controller.run(&manager).unwrap_err();
        assert!(matches!(err, ControllerError::AmbiguousAddress { .. }));
        assert!(manager.hosts.borrow().is_empty());
    }

    #[test]
    fn fixed_ip_is_registered_before_random_allocation() {
        let graph_file = write_graph();
        let mut config = base_config(graph_file.path().to_string_lossy().into_owned());
        let mut a = host(0);
        a.ip_addr = Some(std::net::Ipv4Addr::new(10, 0, 0, 5));
        config.hosts.insert("a".to_string(), a);
        let mut b = host(1);
        b.quantity = 10;
        config.hosts.insert("b".to_string(), b);

        let controller = Controller::new(&config).unwrap();
        let manager = MockManager::new(vec![]);
        controller.run(&manager).unwrap();

        let hosts = manager.hosts.borrow();
        assert_eq!(hosts.len(), 11);
        let a_host = hosts.iter().find(|h| h.params.name == "a").unwrap();
        assert_eq!(a_host.params.ip_addr, std::net::Ipv4Addr::new(10, 0, 0, 5));

        let mut b_names: Vec<&str> = hosts
            .iter()
            .filter(|h| h.params.name.starts_with('B') || h.params.name.starts_with('b'))
            .map(|h| h.params.name.as_str())
            .collect();
        b_names.sort();
        let expected: Vec<String> = (1..=10).map(|i| format!("b{i}")).collect();
        assert_eq!(b_names, expected.iter().map(String::as_str).collect::<Vec<_>>());

        // the random allocator never collided with the fixed address
        for h in hosts.iter() {
            if h.params.name != "a" {
                assert_ne!(h.params.ip_addr, std::net::Ipv4Addr::new(10, 0, 0, 5));
            }
        }
    }

    #[test]
    fn runahead_config_floor_wins_over_smaller_observed_latency() {
        let graph_file = write_graph();
        let mut config = base_config(graph_file.path().to_string_lossy().into_owned());
        config.general.stop_time = units::Time::new(50, TimePrefix::Milli);
        config.general.runahead = Some(units::Time::new(5, TimePrefix::Milli));
        config.general.workers = 1;
        config.hosts.insert("a".to_string(), host(0));

        let controller = Controller::new(&config).unwrap();
        let event_times = vec![SimulationTime::from_millis(0)];
        // the manager reports a 2 ms observed path latency, smaller than the 5 ms runahead
        // floor configured above; the window must still be clamped to the 5 ms floor.
        let manager = MockManager::with_observed_latency(event_times, 2.0);
        controller.run(&manager).unwrap();

        let windows = manager.windows.borrow();
        assert_eq!(windows.len(), 1);
        let (start, end, keep_running) = windows[0];
        assert_eq!(start.as_millis(), 0);
        assert_eq!(end.as_millis(), 5);
        assert!(keep_running);
    }

    #[test]
    fn window_termination_sequence() {
        let graph_file = write_graph();
        let mut config = base_config(graph_file.path().to_string_lossy().into_owned());
        config.general.stop_time = units::Time::new(100, TimePrefix::Milli);
        config.general.runahead = Some(units::Time::new(30, TimePrefix::Milli));
        config.general.workers = 1;
        config.hosts.insert("a".to_string(), host(0));

        let controller = Controller::new(&config).unwrap();
        let event_times: Vec<_> = [0u64, 30, 60, 90, 100]
            .iter()
            .map(|&ms| SimulationTime::from_millis(ms))
            .collect();
        let manager = MockManager::new(event_times);
        controller.run(&manager).unwrap();

        let windows = manager.windows.borrow();
        let ends: Vec<u64> = windows.iter().map(|(_, end, _)| end.as_millis()).collect();
        let keep_running: Vec<bool> = windows.iter().map(|(_, _, k)| *k).collect();

        assert_eq!(ends, vec![30, 60, 90, 100, 100]);
        assert_eq!(keep_running, vec![true, true, true, true, false]);
    }
}
