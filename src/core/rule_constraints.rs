//! Rule constraint functions
//!
//! This module centralizes the business rules about valid field combinations:
//! which protocols take ports, when a rule needs its own custom service, which
//! families a scope admits, and how a protocol is spelled per family.
//!
//! # Examples
//!
//! ```
//! use simpfw::core::rule::{ApplyTo, Family, Protocol};
//! use simpfw::core::rule_constraints::*;
//!
//! assert!(protocol_supports_ports(Protocol::Tcp));
//! assert!(!protocol_supports_ports(Protocol::Esp));
//!
//! assert!(family_in_scope(Family::Ipv4, ApplyTo::Any));
//! assert!(!family_in_scope(Family::Ipv6, ApplyTo::Ipv4));
//! ```

use super::rule::{ApplyTo, Family, PortRange, Protocol};

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Constraints
// ═══════════════════════════════════════════════════════════════════════════

/// Returns `true` if the protocol supports port matching.
///
/// # Examples
///
/// ```
/// use simpfw::core::rule::Protocol;
/// use simpfw::core::rule_constraints::protocol_supports_ports;
///
/// assert!(protocol_supports_ports(Protocol::Tcp));
/// assert!(protocol_supports_ports(Protocol::Udp));
/// assert!(!protocol_supports_ports(Protocol::All));
/// assert!(!protocol_supports_ports(Protocol::Ah));
/// assert!(!protocol_supports_ports(Protocol::Icmp));
/// ```
#[inline]
pub fn protocol_supports_ports(protocol: Protocol) -> bool {
    matches!(protocol, Protocol::Tcp | Protocol::Udp)
}

/// Returns `true` if the rule bundles its ports into a custom service.
///
/// Any tcp/udp rule with at least one port gets a service named after the rule, and
/// its rich rules reference `simp_<title>` by name. When the rule is open to every
/// address of both families the zone also lists the service.
#[inline]
pub fn requires_custom_service(protocol: Protocol, ports: &[PortRange]) -> bool {
    protocol_supports_ports(protocol) && !ports.is_empty()
}

/// Protocol value to match in a rich rule for the given family.
///
/// Returns `None` for `all`, which matches on source alone.
///
/// # Examples
///
/// ```
/// use simpfw::core::rule::{Family, Protocol};
/// use simpfw::core::rule_constraints::protocol_match_value;
///
/// assert_eq!(protocol_match_value(Protocol::Icmp, Family::Ipv4), Some("icmp"));
/// assert_eq!(protocol_match_value(Protocol::Icmp, Family::Ipv6), Some("ipv6-icmp"));
/// assert_eq!(protocol_match_value(Protocol::Esp, Family::Ipv6), Some("esp"));
/// assert_eq!(protocol_match_value(Protocol::All, Family::Ipv4), None);
/// ```
#[inline]
pub fn protocol_match_value(protocol: Protocol, family: Family) -> Option<&'static str> {
    match (protocol, family) {
        (Protocol::All, _) => None,
        (Protocol::Icmp, Family::Ipv6) => Some("ipv6-icmp"),
        (other, _) => Some(other.as_str()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Scope Constraints
// ═══════════════════════════════════════════════════════════════════════════

/// Returns `true` if rules for `family` may be emitted under `apply_to`.
#[inline]
pub fn family_in_scope(family: Family, apply_to: ApplyTo) -> bool {
    match apply_to {
        ApplyTo::Any => true,
        ApplyTo::Ipv4 => family == Family::Ipv4,
        ApplyTo::Ipv6 => family == Family::Ipv6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_only_tcp_udp_take_ports() {
        let with_ports: Vec<Protocol> = Protocol::iter().filter(|p| protocol_supports_ports(*p)).collect();
        assert_eq!(with_ports, vec![Protocol::Tcp, Protocol::Udp]);
    }

    #[test]
    fn test_custom_service_needs_ports() {
        let ports = [PortRange::single(22)];
        assert!(requires_custom_service(Protocol::Tcp, &ports));
        assert!(requires_custom_service(Protocol::Udp, &ports));
        assert!(!requires_custom_service(Protocol::Tcp, &[]));
        assert!(!requires_custom_service(Protocol::All, &ports));
    }

    #[test]
    fn test_scope() {
        for family in Family::iter() {
            assert!(family_in_scope(family, ApplyTo::Any));
        }
        assert!(family_in_scope(Family::Ipv4, ApplyTo::Ipv4));
        assert!(!family_in_scope(Family::Ipv4, ApplyTo::Ipv6));
        assert!(family_in_scope(Family::Ipv6, ApplyTo::Ipv6));
    }

    #[test]
    fn test_ipsec_protocols_match_by_name() {
        for family in Family::iter() {
            assert_eq!(protocol_match_value(Protocol::Ah, family), Some("ah"));
            assert_eq!(protocol_match_value(Protocol::Esp, family), Some("esp"));
        }
    }
}
