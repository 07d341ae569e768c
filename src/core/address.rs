//! Address classification for trusted network tokens
//!
//! Every entry of a rule's `trusted_nets` is classified exactly once into one of:
//!
//! - an IPv4 network (`10.0.0.0/8`, `10.0.0.1`, `010.000.000.001/32`)
//! - an IPv6 network (`fe80::/64`, `2001:db8::1`, `[::]/0`)
//! - the `all` keyword, meaning the full range of both families
//! - a hostname candidate (`foo.example.com`)
//!
//! Networks are normalized on the way in: host bits are masked off, bare addresses
//! get a full-length prefix, octets lose their leading zeros, and IPv6 is lower-cased
//! and compressed. Two tokens that name the same network therefore have the same
//! normalized form.

use super::error::AddressError;
use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Maximum length of a DNS name
const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single DNS label
const MAX_LABEL_LEN: usize = 63;

/// The category a token falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::AsRefStr)]
pub enum AddressKind {
    #[strum(serialize = "ipv4_cidr")]
    Ipv4Cidr,
    #[strum(serialize = "ipv6_cidr")]
    Ipv6Cidr,
    #[strum(serialize = "all")]
    All,
    #[strum(serialize = "hostname")]
    Hostname,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// A normalized network of either family
    Network(IpNetwork),
    /// The `all`/`any` keyword
    All,
    /// A hostname candidate, lower-cased
    Hostname(String),
}

/// A classified trusted network entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressToken {
    /// The token as written, minus surrounding whitespace
    pub raw: String,
    pub address: Address,
}

impl AddressToken {
    pub fn kind(&self) -> AddressKind {
        match self.address {
            Address::Network(IpNetwork::V4(_)) => AddressKind::Ipv4Cidr,
            Address::Network(IpNetwork::V6(_)) => AddressKind::Ipv6Cidr,
            Address::All => AddressKind::All,
            Address::Hostname(_) => AddressKind::Hostname,
        }
    }

    /// Canonical string form used for de-duplication and identifier derivation
    pub fn normalized(&self) -> String {
        match &self.address {
            Address::Network(net) => net.to_string(),
            Address::All => "all".to_string(),
            Address::Hostname(name) => name.clone(),
        }
    }

    /// Returns `true` for `0.0.0.0/0`, `::/0`, and the `all` keyword.
    pub fn is_full_range(&self) -> bool {
        match self.address {
            Address::Network(net) => net.prefix() == 0,
            Address::All => true,
            Address::Hostname(_) => false,
        }
    }
}

/// Classifies a single trusted network token.
///
/// # Errors
///
/// Returns `Err` if the token:
/// - is empty
/// - carries a prefix length out of range for its family or a non-numeric prefix
/// - is a dotted quad with an octet above 255, or an all-numeric dotted token that
///   is not a dotted quad
/// - contains a colon but does not parse as IPv6
/// - puts a prefix on something that is not an IP address
/// - contains characters that are invalid in a hostname
///
/// # Examples
///
/// ```
/// use simpfw::core::address::{classify, AddressKind};
///
/// let token = classify("1.2.3.4/24").unwrap();
/// assert_eq!(token.kind(), AddressKind::Ipv4Cidr);
/// assert_eq!(token.normalized(), "1.2.3.0/24");
///
/// assert_eq!(classify("foo.bar.baz").unwrap().kind(), AddressKind::Hostname);
/// assert!(classify("1.2.3.4/33").is_err());
/// ```
pub fn classify(token: &str) -> Result<AddressToken, AddressError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(AddressError::new(token, "empty network entry"));
    }

    let address = classify_trimmed(trimmed)?;
    Ok(AddressToken {
        raw: trimmed.to_string(),
        address,
    })
}

fn classify_trimmed(token: &str) -> Result<Address, AddressError> {
    if token.eq_ignore_ascii_case("all") || token.eq_ignore_ascii_case("any") {
        return Ok(Address::All);
    }

    let (addr, prefix) = match token.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (token, None),
    };

    if let Some(ipv4) = parse_dotted_quad(token, addr)? {
        let prefix = parse_prefix(token, prefix, 32)?;
        let net = Ipv4Network::new(ipv4, prefix)
            .map_err(|e| AddressError::new(token, e.to_string()))?;
        let masked = Ipv4Network::new(net.network(), prefix)
            .map_err(|e| AddressError::new(token, e.to_string()))?;
        return Ok(Address::Network(IpNetwork::V4(masked)));
    }

    if addr.contains(':') {
        let bare = addr
            .strip_prefix('[')
            .and_then(|a| a.strip_suffix(']'))
            .unwrap_or(addr);
        let ipv6: Ipv6Addr = bare
            .parse()
            .map_err(|_| AddressError::new(token, "malformed IPv6 address"))?;
        let prefix = parse_prefix(token, prefix, 128)?;
        let net = Ipv6Network::new(ipv6, prefix)
            .map_err(|e| AddressError::new(token, e.to_string()))?;
        let masked = Ipv6Network::new(net.network(), prefix)
            .map_err(|e| AddressError::new(token, e.to_string()))?;
        return Ok(Address::Network(IpNetwork::V6(masked)));
    }

    if prefix.is_some() {
        return Err(AddressError::new(
            token,
            "prefix length given for something that is not an IP address",
        ));
    }

    // A fully qualified name may end in the root label
    let name = token.strip_suffix('.').unwrap_or(token);
    validate_hostname(token, name)?;
    Ok(Address::Hostname(name.to_ascii_lowercase()))
}

/// Parses `a.b.c.d`, tolerating leading zeros in each octet.
///
/// Returns `Ok(None)` when the token is not all-numeric and should be tried as
/// something else.
fn parse_dotted_quad(token: &str, addr: &str) -> Result<Option<Ipv4Addr>, AddressError> {
    let labels: Vec<&str> = addr.split('.').collect();
    let numeric = labels
        .iter()
        .all(|l| !l.is_empty() && l.bytes().all(|b| b.is_ascii_digit()));
    if !numeric {
        return Ok(None);
    }

    if labels.len() != 4 {
        return Err(AddressError::new(token, "IPv4 address must have four octets"));
    }

    let mut octets = [0u8; 4];
    for (slot, label) in octets.iter_mut().zip(&labels) {
        let digits = label.trim_start_matches('0');
        *slot = if digits.is_empty() {
            0
        } else {
            digits
                .parse()
                .map_err(|_| AddressError::new(token, format!("octet '{label}' out of range")))?
        };
    }

    Ok(Some(Ipv4Addr::from(octets)))
}

fn parse_prefix(token: &str, prefix: Option<&str>, max: u8) -> Result<u8, AddressError> {
    let Some(prefix) = prefix else {
        return Ok(max);
    };

    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressError::new(token, format!("invalid prefix length '{prefix}'")));
    }

    match prefix.parse::<u8>() {
        Ok(len) if len <= max => Ok(len),
        _ => Err(AddressError::new(
            token,
            format!("prefix length {prefix} out of range (0-{max})"),
        )),
    }
}

fn validate_hostname(token: &str, name: &str) -> Result<(), AddressError> {
    if name.len() > MAX_HOSTNAME_LEN {
        return Err(AddressError::new(token, "hostname too long (max 253 characters)"));
    }

    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(AddressError::new(token, "hostname has an empty or oversized label"));
        }
        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(AddressError::new(token, "hostname contains invalid characters"));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(AddressError::new(token, "hostname label starts or ends with '-'"));
        }
    }

    if name.bytes().all(|b| b.is_ascii_digit() || b == b'-' || b == b'.') {
        return Err(AddressError::new(
            token,
            "not an IP address or hostname (address ranges are not supported)",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalized(token: &str) -> String {
        classify(token).unwrap().normalized()
    }

    #[test]
    fn test_ipv4_bare_expands_to_host_prefix() {
        assert_eq!(normalized("3.4.5.6"), "3.4.5.6/32");
        assert_eq!(classify("3.4.5.6").unwrap().kind(), AddressKind::Ipv4Cidr);
    }

    #[test]
    fn test_ipv4_masks_host_bits() {
        assert_eq!(normalized("1.2.3.4/24"), "1.2.3.0/24");
        assert_eq!(normalized("2.3.4.5/8"), "2.0.0.0/8");
    }

    #[test]
    fn test_ipv4_strips_leading_zeros() {
        assert_eq!(normalized("010.000.002.033"), "10.0.2.33/32");
        assert_eq!(normalized("10.0.2.33/032"), "10.0.2.33/32");
    }

    #[test]
    fn test_ipv4_rejects_bad_octet() {
        let err = classify("300.1.1.1").unwrap_err();
        assert!(err.reason.contains("out of range"));
        assert!(classify("1.2.3").is_err());
        assert!(classify("1.2.3.4.5").is_err());
    }

    #[test]
    fn test_prefix_out_of_range() {
        assert!(classify("1.2.3.4/33").is_err());
        assert!(classify("fe80::/129").is_err());
        assert!(classify("1.2.3.4/").is_err());
        assert!(classify("1.2.3.4/abc").is_err());
    }

    #[test]
    fn test_ipv6_normalization() {
        assert_eq!(
            normalized("2001:cdba:0000:0000:0000:0000:3257:9652/128"),
            "2001:cdba::3257:9652/128"
        );
        assert_eq!(normalized("2001:CDBA:0000:0000:0000:0000:3257:9652/16"), "2001::/16");
        assert_eq!(normalized("FE80::1"), "fe80::1/128");
        assert_eq!(normalized("[::]/0"), "::/0");
    }

    #[test]
    fn test_ipv6_malformed() {
        assert!(classify("fe80:::1").is_err());
        assert!(classify("2001:zz::1").is_err());
    }

    #[test]
    fn test_full_range() {
        assert!(classify("0.0.0.0/0").unwrap().is_full_range());
        assert!(classify("::/0").unwrap().is_full_range());
        assert!(classify("ALL").unwrap().is_full_range());
        assert_eq!(classify("any").unwrap().kind(), AddressKind::All);
        assert!(!classify("10.0.0.0/8").unwrap().is_full_range());
    }

    #[test]
    fn test_hostnames() {
        let token = classify("Foo.Bar.Baz").unwrap();
        assert_eq!(token.kind(), AddressKind::Hostname);
        assert_eq!(token.raw, "Foo.Bar.Baz");
        assert_eq!(token.normalized(), "foo.bar.baz");
        assert_eq!(classify("localhost").unwrap().kind(), AddressKind::Hostname);
        assert_eq!(classify("host-1.example").unwrap().kind(), AddressKind::Hostname);
    }

    #[test]
    fn test_invalid_hostnames() {
        assert!(classify("foo/24").is_err());
        assert!(classify("foo..bar").is_err());
        assert!(classify("foo bar").is_err());
        assert!(classify("-foo.bar").is_err());
        assert!(classify("foo.bar..").is_err());
        assert!(classify(".").is_err());
        assert!(classify("").is_err());
        assert!(classify("   ").is_err());
    }

    #[test]
    fn test_fqdn_trailing_dot() {
        let token = classify("Foo.Bar.").unwrap();
        assert_eq!(token.kind(), AddressKind::Hostname);
        assert_eq!(token.raw, "Foo.Bar.");
        assert_eq!(token.normalized(), "foo.bar");
    }

    #[test]
    fn test_address_ranges_rejected() {
        let err = classify("10.0.0.1-10.0.0.5").unwrap_err();
        assert!(err.reason.contains("ranges"), "{}", err.reason);
        assert!(classify("10-20").is_err());
        assert!(classify("1.2.3.4.").is_err());
        assert_eq!(classify("10-20.example").unwrap().kind(), AddressKind::Hostname);
    }

    #[test]
    fn test_whitespace_trimmed() {
        let token = classify("  10.0.0.1  ").unwrap();
        assert_eq!(token.raw, "10.0.0.1");
        assert_eq!(token.normalized(), "10.0.0.1/32");
    }
}
