//! Expands the configuration's `HostOptions` map into concrete hosts and virtual processes.
//!
//! Registration runs in two passes: every host with an explicit IP address is registered
//! first, then every host that needs one auto-allocated. This guarantees a fixed address is
//! never stolen out from under its owner by the random allocator, regardless of the order the
//! hosts appear in the configuration (see invariant 8 in the design notes).

use std::net::Ipv4Addr;

use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::{ConfigOptions, HostOptions, LogLevel, ProcessOptions, QDiscMode};
use crate::core::manager::Manager;
use crate::error::ControllerError;
use crate::network::dns::{DnsBuilder, HostId};
use crate::network::graph::NetworkGraph;
use crate::network::ip_assignment::IpAssignment;
use crate::support::simulation_time::SimulationTime;
use crate::support::units::{self, Unit};
use crate::utility::tilde_expansion;

/// The immutable per-host descriptor handed to the Manager when a virtual host is created.
#[derive(Debug, Clone)]
pub struct HostParameters {
    pub name: String,
    pub ip_addr: Ipv4Addr,
    pub network_node_id: u32,
    pub cpu_frequency_hz: u64,
    pub cpu_threshold: SimulationTime,
    pub cpu_precision: SimulationTime,
    pub log_level: Option<LogLevel>,
    pub heartbeat_log_level: Option<LogLevel>,
    pub heartbeat_log_info: Vec<String>,
    pub heartbeat_interval: Option<SimulationTime>,
    pub bandwidth_down_bits: u64,
    pub bandwidth_up_bits: u64,
    pub socket_send_buffer: u64,
    pub socket_recv_buffer: u64,
    pub socket_send_autotune: bool,
    pub socket_recv_autotune: bool,
    pub interface_buffer: Option<u64>,
    pub interface_qdisc: Option<QDiscMode>,
    pub pcap_directory: Option<String>,
}

/// Register every host (and its processes) described by `config.hosts` with `manager`,
/// assigning IP addresses via `ip_assignment` and hostnames via `dns`.
pub fn register_hosts(
    config: &ConfigOptions,
    graph: &NetworkGraph,
    manager: &dyn Manager,
    rng: &mut Xoshiro256PlusPlus,
    ip_assignment: &mut IpAssignment<String>,
    dns: &mut DnsBuilder,
) -> Result<(), ControllerError> {
    let mut next_host_id = 0u32;

    // pass 1: hosts with an explicit IP address
    for (name, host) in config.hosts.iter().filter(|(_, h)| h.ip_addr.is_some()) {
        register_host(
            name, host, config, graph, manager, rng, ip_assignment, dns, &mut next_host_id,
        )?;
    }

    // pass 2: hosts that need an address auto-allocated
    for (name, host) in config.hosts.iter().filter(|(_, h)| h.ip_addr.is_none()) {
        register_host(
            name, host, config, graph, manager, rng, ip_assignment, dns, &mut next_host_id,
        )?;
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn register_host(
    name: &str,
    host: &HostOptions,
    config: &ConfigOptions,
    graph: &NetworkGraph,
    manager: &dyn Manager,
    rng: &mut Xoshiro256PlusPlus,
    ip_assignment: &mut IpAssignment<String>,
    dns: &mut DnsBuilder,
    next_host_id: &mut u32,
) -> Result<(), ControllerError> {
    if host.ip_addr.is_some() && host.quantity > 1 {
        return Err(ControllerError::AmbiguousAddress {
            name: name.to_string(),
        });
    }

    let node_index = graph
        .node_id_to_index(host.network_node_id)
        .copied()
        .ok_or_else(|| ControllerError::NodeMissing {
            name: name.to_string(),
            node: host.network_node_id,
        })?;

    let bandwidth_down_bits = resolve_bandwidth(
        host.bandwidth_down,
        graph.bandwidth_down(host.network_node_id),
        name,
        "downstream",
    )?;
    let bandwidth_up_bits = resolve_bandwidth(
        host.bandwidth_up,
        graph.bandwidth_up(host.network_node_id),
        name,
        "upstream",
    )?;

    for i in 0..host.quantity {
        let hostname = if host.quantity == 1 {
            name.to_string()
        } else {
            format!("{name}{}", i + 1)
        };

        let ip = match host.ip_addr {
            Some(ip) => {
                ip_assignment.assign_host_with_ip(hostname.clone(), ip, node_index)?;
                ip
            }
            None => ip_assignment.assign_host(hostname.clone(), node_index, rng)?,
        };

        let host_id = HostId::from(*next_host_id);
        *next_host_id += 1;
        dns.register(host_id, ip, hostname.clone())?;

        let params = HostParameters {
            name: hostname.clone(),
            ip_addr: ip,
            network_node_id: host.network_node_id,
            cpu_frequency_hz: manager.cpu_frequency_hz(),
            cpu_threshold: SimulationTime::ZERO,
            cpu_precision: SimulationTime::from_nanos(200),
            log_level: host.log_level,
            heartbeat_log_level: host.heartbeat_log_level,
            heartbeat_log_info: host.heartbeat_log_info.clone(),
            heartbeat_interval: host
                .heartbeat_interval
                .map(|t| SimulationTime::from_nanos(nanos_of(t))),
            bandwidth_down_bits,
            bandwidth_up_bits,
            socket_send_buffer: config.network.socket_send_buffer.unwrap_or(0),
            socket_recv_buffer: config.network.socket_recv_buffer.unwrap_or(0),
            socket_send_autotune: config.network.socket_send_autotune,
            socket_recv_autotune: config.network.socket_recv_autotune,
            interface_buffer: config.network.interface_buffer,
            interface_qdisc: config.network.interface_qdisc,
            pcap_directory: host.pcap_directory.clone(),
        };

        manager.add_new_virtual_host(params)?;

        for proc in &host.processes {
            register_process(&hostname, proc, manager)?;
        }
    }

    Ok(())
}

fn nanos_of(t: units::Time<units::TimePrefix>) -> u64 {
    t.convert(units::TimePrefix::Nano).unwrap().value()
}

fn resolve_bandwidth(
    host_value: Option<units::BitsPerSec<units::SiPrefixUpper>>,
    graph_value: Option<units::BitsPerSec<units::SiPrefixUpper>>,
    name: &str,
    direction: &'static str,
) -> Result<u64, ControllerError> {
    let value = host_value.or(graph_value).ok_or(ControllerError::Bandwidth {
        name: name.to_string(),
        direction,
    })?;
    let bits = value.convert(units::SiPrefixUpper::Base).unwrap().value();
    if bits == 0 {
        return Err(ControllerError::Bandwidth {
            name: name.to_string(),
            direction,
        });
    }
    Ok(bits)
}

fn register_process(
    hostname: &str,
    proc: &ProcessOptions,
    manager: &dyn Manager,
) -> Result<(), ControllerError> {
    let expanded_path = tilde_expansion(proc.raw_path());

    let resolved = which::which(&expanded_path)
        .ok()
        .and_then(|p| p.canonicalize().ok())
        .ok_or_else(|| ControllerError::PluginPath {
            name: hostname.to_string(),
            raw_path: proc.raw_path().to_string(),
        })?;

    let mut args: Vec<String> = vec![resolved.to_string_lossy().into_owned()];
    args.extend(proc.args.iter().cloned());

    let start_time = SimulationTime::from_nanos(nanos_of(proc.start_time));
    let stop_time = SimulationTime::from_nanos(nanos_of(proc.stop_time));

    for _ in 0..proc.quantity {
        manager.add_new_virtual_process(
            hostname,
            &resolved,
            &args,
            &proc.environment,
            start_time,
            stop_time,
        )?;
    }

    Ok(())
}
