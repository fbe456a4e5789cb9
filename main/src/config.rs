//! Typed accessors over the simulation's YAML configuration.
//!
//! Parsing itself is a thin `serde_yaml` pass; the interesting behavior lives in how the
//! Controller and [`crate::core::host_registry`] consume these types. Hosts are stored in a
//! `BTreeMap` keyed by hostname so iteration is in sorted order regardless of the order they
//! appeared in the file — useful for determinism (invariant 5 in the spec).

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::support::units::{BitsPerSec, SiPrefixUpper, Time, TimePrefix};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QDiscMode {
    Fifo,
    RoundRobin,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralOptions {
    pub seed: u64,
    pub stop_time: Time<TimePrefix>,
    #[serde(default)]
    pub bootstrap_end_time: Time<TimePrefix>,
    #[serde(default)]
    pub runahead: Option<Time<TimePrefix>>,
    #[serde(default)]
    pub workers: u32,
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkOptions {
    pub graph_path: String,
    #[serde(default = "default_true")]
    pub use_shortest_path: bool,
    #[serde(default)]
    pub socket_send_buffer: Option<u64>,
    #[serde(default)]
    pub socket_recv_buffer: Option<u64>,
    #[serde(default)]
    pub socket_send_autotune: bool,
    #[serde(default)]
    pub socket_recv_autotune: bool,
    #[serde(default)]
    pub interface_buffer: Option<u64>,
    #[serde(default)]
    pub interface_qdisc: Option<QDiscMode>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessOptions {
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub environment: String,
    pub start_time: Time<TimePrefix>,
    pub stop_time: Time<TimePrefix>,
    #[serde(default = "default_quantity")]
    pub quantity: u64,
}

fn default_quantity() -> u64 {
    1
}

impl ProcessOptions {
    pub fn raw_path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostOptions {
    #[serde(default = "default_quantity")]
    pub quantity: u64,
    #[serde(default)]
    pub ip_addr: Option<Ipv4Addr>,
    pub network_node_id: u32,
    #[serde(default)]
    pub log_level: Option<LogLevel>,
    #[serde(default)]
    pub heartbeat_log_level: Option<LogLevel>,
    #[serde(default)]
    pub heartbeat_log_info: Vec<String>,
    #[serde(default)]
    pub heartbeat_interval: Option<Time<TimePrefix>>,
    #[serde(default)]
    pub pcap_directory: Option<String>,
    #[serde(default)]
    pub bandwidth_down: Option<BitsPerSec<SiPrefixUpper>>,
    #[serde(default)]
    pub bandwidth_up: Option<BitsPerSec<SiPrefixUpper>>,
    #[serde(default)]
    pub processes: Vec<ProcessOptions>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigOptions {
    pub general: GeneralOptions,
    pub network: NetworkOptions,
    // we use a BTreeMap so that the hosts are sorted by their hostname (useful for determinism)
    pub hosts: BTreeMap<String, HostOptions>,
}

impl ConfigOptions {
    pub fn from_yaml_str(s: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(s)
    }
}
