//! Maps hosts (identified by a generic `S` key, typically a hostname) to IPv4 addresses and
//! back to the graph node they're attached to.
//!
//! Addresses are either supplied explicitly by the caller or drawn from the seeded random
//! source. Random draws reject the reserved ranges below and anything already assigned,
//! redrawing until a usable address turns up — so allocation is a function of the seed alone
//! and is reproducible across runs given the same registration order.

use std::collections::HashMap;
use std::hash::Hash;
use std::net::Ipv4Addr;

use petgraph::graph::NodeIndex;
use rand::RngCore;

use crate::error::ControllerError;

/// `0.0.0.0/8` ("this network"), `127.0.0.0/8` (loopback), `224.0.0.0/4` (multicast), and the
/// limited broadcast address `255.255.255.255` are never handed out.
fn is_reserved(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 0 || octets[0] == 127 || (octets[0] & 0xf0) == 224 || ip == Ipv4Addr::BROADCAST
}

#[derive(Debug)]
struct Assignment {
    ip: Ipv4Addr,
    node: NodeIndex,
}

/// Bidirectional map between host keys, assigned IPv4 addresses, and the graph node the host is
/// attached to.
#[derive(Debug, Default)]
pub struct IpAssignment<S: Clone + Eq + Hash> {
    by_key: HashMap<S, Assignment>,
    by_ip: HashMap<Ipv4Addr, S>,
}

impl<S: Clone + Eq + Hash> IpAssignment<S> {
    pub fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            by_ip: HashMap::new(),
        }
    }

    /// Assign a specific IP address to `key`. Fails if the address is reserved or already in
    /// use by a different key.
    pub fn assign_host_with_ip(
        &mut self,
        key: S,
        ip: Ipv4Addr,
        node: NodeIndex,
    ) -> Result<(), ControllerError> {
        if is_reserved(ip) {
            return Err(ControllerError::ReservedAddress { addr: ip.into() });
        }
        if self.by_ip.contains_key(&ip) {
            return Err(ControllerError::AddressInUse { addr: ip.into() });
        }

        self.by_ip.insert(ip, key.clone());
        self.by_key.insert(key, Assignment { ip, node });
        Ok(())
    }

    /// Draw a random, non-reserved, unassigned IPv4 address for `key` using `rng`, redrawing on
    /// collision.
    pub fn assign_host(
        &mut self,
        key: S,
        node: NodeIndex,
        rng: &mut dyn RngCore,
    ) -> Result<Ipv4Addr, ControllerError> {
        loop {
            let word = rng.next_u32();
            let ip = Ipv4Addr::from(word);
            if is_reserved(ip) || self.by_ip.contains_key(&ip) {
                continue;
            }
            self.by_ip.insert(ip, key.clone());
            self.by_key.insert(key, Assignment { ip, node });
            return Ok(ip);
        }
    }

    pub fn get_ip(&self, key: &S) -> Option<Ipv4Addr> {
        self.by_key.get(key).map(|a| a.ip)
    }

    pub fn get_node(&self, key: &S) -> Option<NodeIndex> {
        self.by_key.get(key).map(|a| a.node)
    }

    pub fn lookup_node(&self, ip: Ipv4Addr) -> Option<NodeIndex> {
        let key = self.by_ip.get(&ip)?;
        self.by_key.get(key).map(|a| a.node)
    }

    pub fn lookup_key(&self, ip: Ipv4Addr) -> Option<&S> {
        self.by_ip.get(&ip)
    }

    pub fn is_assigned(&self, ip: Ipv4Addr) -> bool {
        self.by_ip.contains_key(&ip)
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Every distinct graph node that has at least one host assigned to it.
    pub fn used_nodes(&self) -> Vec<NodeIndex> {
        let mut nodes: Vec<NodeIndex> = self.by_key.values().map(|a| a.node).collect();
        nodes.sort_unstable_by_key(|n| n.index());
        nodes.dedup();
        nodes
    }
}
