//! The named error taxonomy used across graph loading, host registration, and routing
//! construction. Query-time lookups (latency, reliability, routability) surface
//! [`ControllerError::Unroutable`] as an ordinary `Err`, never a fatal condition.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("network topology is malformed or inconsistent: {0}")]
    Topology(String),

    #[error("address {addr} is already assigned")]
    AddressInUse { addr: std::net::IpAddr },

    #[error("address {addr} is in a reserved range")]
    ReservedAddress { addr: std::net::IpAddr },

    #[error("host '{name}' has an explicit IP address but a quantity greater than 1")]
    AmbiguousAddress { name: String },

    #[error("host '{name}' references unknown graph node {node}")]
    NodeMissing { name: String, node: u32 },

    #[error("host '{name}' is missing {direction} bandwidth, or it is zero")]
    Bandwidth { name: String, direction: &'static str },

    #[error("could not resolve executable path '{raw_path}' for host '{name}'")]
    PluginPath { name: String, raw_path: String },

    #[error("hostname '{name}' is already registered")]
    Duplicate { name: String },

    #[error("no route exists between {src} and {dst}")]
    Unroutable {
        src: std::net::IpAddr,
        dst: std::net::IpAddr,
    },
}

pub type ControllerResult<T> = Result<T, ControllerError>;
