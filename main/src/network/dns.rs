//! Hostname resolution: a bidirectional map between hostnames and the IPv4 addresses
//! [`crate::network::ip_assignment::IpAssignment`] handed out for them.
//!
//! Unlike the rest of the network layer, which is built once and then immutable, hosts are
//! registered one at a time as [`crate::core::host_registry`] walks the configuration. A
//! [`DnsBuilder`] accumulates registrations and is finalized into a [`Dns`] once registration
//! closes.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::error::ControllerError;

/// An opaque, monotonically increasing identity assigned to each registered host, in
/// registration order. Used as the stable key DNS records carry instead of a raw index into
/// some other collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(u32);

impl From<u32> for HostId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<HostId> for u32 {
    fn from(value: HostId) -> Self {
        value.0
    }
}

#[derive(Debug)]
struct Record {
    id: HostId,
    addr: Ipv4Addr,
    name: String,
}

#[derive(Debug, Default)]
struct Database {
    name_index: HashMap<String, Arc<Record>>,
    addr_index: HashMap<Ipv4Addr, Arc<Record>>,
}

#[derive(Debug, Default)]
pub struct DnsBuilder {
    db: Database,
}

impl DnsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hostname. Loopback and unspecified addresses are skipped (they're never
    /// routable and don't need a DNS entry), but a genuine name collision between two
    /// routable hosts is an error: two hosts sharing a hostname would make `name_to_addr`
    /// ambiguous, so we reject it outright instead of silently keeping the first one.
    pub fn register(
        &mut self,
        id: HostId,
        addr: Ipv4Addr,
        name: String,
    ) -> Result<(), ControllerError> {
        if addr.is_loopback() || addr.is_unspecified() {
            return Ok(());
        }

        if self.db.name_index.contains_key(&name) {
            return Err(ControllerError::Duplicate { name });
        }

        let record = Arc::new(Record {
            id,
            addr,
            name: name.clone(),
        });
        self.db.name_index.insert(name, record.clone());
        self.db.addr_index.insert(addr, record);
        Ok(())
    }

    pub fn into_dns(self) -> Dns {
        Dns { db: self.db }
    }
}

#[derive(Debug)]
pub struct Dns {
    db: Database,
}

impl Dns {
    pub fn addr_to_host_id(&self, addr: Ipv4Addr) -> Option<HostId> {
        self.db.addr_index.get(&addr).map(|record| record.id)
    }

    pub fn addr_to_name(&self, addr: Ipv4Addr) -> Option<&str> {
        self.db
            .addr_index
            .get(&addr)
            .map(|record| record.name.as_str())
    }

    pub fn name_to_addr(&self, name: &str) -> Option<Ipv4Addr> {
        self.db.name_index.get(name).map(|record| record.addr)
    }

    pub fn len(&self) -> usize {
        self.db.name_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.name_index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_a() -> (HostId, Ipv4Addr, String) {
        (HostId::from(0), Ipv4Addr::new(100, 1, 2, 3), "myhost".into())
    }

    fn host_b() -> (HostId, Ipv4Addr, String) {
        (
            HostId::from(1),
            Ipv4Addr::new(200, 3, 2, 1),
            "theirhost".into(),
        )
    }

    #[test]
    fn lookups() {
        let (id_a, addr_a, name_a) = host_a();
        let (id_b, addr_b, name_b) = host_b();

        let mut builder = DnsBuilder::new();
        builder.register(id_a, addr_a, name_a.clone()).unwrap();
        builder.register(id_b, addr_b, name_b.clone()).unwrap();
        let dns = builder.into_dns();

        assert_eq!(dns.addr_to_host_id(addr_a), Some(id_a));
        assert_eq!(dns.addr_to_host_id(addr_b), Some(id_b));
        assert_eq!(dns.addr_to_host_id(Ipv4Addr::new(1, 2, 3, 4)), None);

        assert_eq!(dns.addr_to_name(addr_a), Some(name_a.as_str()));
        assert_eq!(dns.name_to_addr(&name_a), Some(addr_a));
        assert_eq!(dns.name_to_addr("empty"), None);
        assert_eq!(dns.name_to_addr("localhost"), None);
    }

    #[test]
    fn loopback_and_unspecified_are_not_registered() {
        let mut builder = DnsBuilder::new();
        builder
            .register(HostId::from(0), Ipv4Addr::LOCALHOST, "lo".into())
            .unwrap();
        builder
            .register(HostId::from(1), Ipv4Addr::UNSPECIFIED, "unspec".into())
            .unwrap();
        let dns = builder.into_dns();
        assert!(dns.is_empty());
    }

    #[test]
    fn duplicate_hostname_is_rejected() {
        let mut builder = DnsBuilder::new();
        builder
            .register(HostId::from(0), Ipv4Addr::new(10, 0, 0, 1), "dup".into())
            .unwrap();
        let err = builder
            .register(HostId::from(1), Ipv4Addr::new(10, 0, 0, 2), "dup".into())
            .unwrap_err();
        assert!(matches!(err, ControllerError::Duplicate { .. }));
    }
}
