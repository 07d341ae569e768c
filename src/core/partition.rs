//! Network partitioning by address family
//!
//! Splits a rule's classified trusted networks into one [`NetworkSet`] per family,
//! collecting hostnames on the side for the advisory warning.

use super::address::{Address, AddressToken};
use super::rule::{ApplyTo, Family};
use super::rule_constraints::family_in_scope;
use ipnetwork::IpNetwork;

/// Ordered, de-duplicated networks of a single family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSet {
    family: Family,
    members: Vec<IpNetwork>,
}

impl NetworkSet {
    pub fn new(family: Family) -> Self {
        Self {
            family,
            members: Vec::new(),
        }
    }

    /// Builds a set from networks, skipping duplicates and networks of the other family.
    pub fn from_networks(family: Family, nets: impl IntoIterator<Item = IpNetwork>) -> Self {
        let mut set = Self::new(family);
        for net in nets {
            set.insert(net);
        }
        set
    }

    /// Adds a network if it is of this set's family and not already present.
    ///
    /// Returns `true` if the network was added.
    pub fn insert(&mut self, net: IpNetwork) -> bool {
        if Family::of(&net) != self.family || self.members.contains(&net) {
            return false;
        }
        self.members.push(net);
        true
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Members in first-seen order
    pub fn members(&self) -> &[IpNetwork] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Normalized member strings, sorted
    pub fn canonical_members(&self) -> Vec<String> {
        let mut members: Vec<String> = self.members.iter().map(ToString::to_string).collect();
        members.sort_unstable();
        members
    }

    fn clear(&mut self) {
        self.members.clear();
    }

    fn replace_with_wildcard(&mut self) {
        self.members = vec![self.family.wildcard()];
    }
}

/// The result of partitioning a rule's trusted networks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub ipv4: NetworkSet,
    pub ipv6: NetworkSet,
    /// Hostnames as written, first-seen order
    pub hostnames: Vec<String>,
    /// A full-range entry (`0.0.0.0/0`, `::/0`, `all`) was present
    pub open_to_all: bool,
}

impl Partition {
    /// Non-empty sets, IPv4 first
    pub fn sets(&self) -> impl Iterator<Item = &NetworkSet> {
        [&self.ipv4, &self.ipv6].into_iter().filter(|s| !s.is_empty())
    }
}

/// Partitions classified tokens into per-family network sets.
///
/// A full-range entry replaces both families' sets with their wildcard, since it
/// subsumes everything else listed. Sets for families outside `apply_to` are
/// emptied; that is not an error.
///
/// # Examples
///
/// ```
/// use simpfw::core::address::classify;
/// use simpfw::core::partition::partition;
/// use simpfw::core::rule::ApplyTo;
///
/// let tokens: Vec<_> = ["10.0.0.1", "fe80::/64", "10.0.0.1/32", "foo.bar.baz"]
///     .iter()
///     .map(|t| classify(t).unwrap())
///     .collect();
///
/// let parts = partition(&tokens, ApplyTo::Any);
/// assert_eq!(parts.ipv4.len(), 1);
/// assert_eq!(parts.ipv6.len(), 1);
/// assert_eq!(parts.hostnames, vec!["foo.bar.baz"]);
///
/// let parts = partition(&tokens, ApplyTo::Ipv6);
/// assert!(parts.ipv4.is_empty());
/// ```
pub fn partition(tokens: &[AddressToken], apply_to: ApplyTo) -> Partition {
    let mut ipv4 = NetworkSet::new(Family::Ipv4);
    let mut ipv6 = NetworkSet::new(Family::Ipv6);
    let mut hostnames: Vec<String> = Vec::new();
    let mut seen_hosts: Vec<String> = Vec::new();
    let mut open_to_all = false;

    for token in tokens {
        if token.is_full_range() {
            open_to_all = true;
            continue;
        }

        match &token.address {
            Address::Network(net) => {
                if net.is_ipv4() {
                    ipv4.insert(*net);
                } else {
                    ipv6.insert(*net);
                }
            }
            Address::Hostname(normalized) => {
                if !seen_hosts.contains(normalized) {
                    seen_hosts.push(normalized.clone());
                    hostnames.push(token.raw.clone());
                }
            }
            Address::All => open_to_all = true,
        }
    }

    if open_to_all {
        ipv4.replace_with_wildcard();
        ipv6.replace_with_wildcard();
    }

    for set in [&mut ipv4, &mut ipv6] {
        if !family_in_scope(set.family(), apply_to) {
            set.clear();
        }
    }

    Partition {
        ipv4,
        ipv6,
        hostnames,
        open_to_all,
    }
}
