//! Network address allocation module
//! Draws client IPs, destination IPs, and ports for synthesized events

use anyhow::Context;
use rand::seq::SliceRandom;
use rand::Rng;
use std::net::Ipv4Addr;

/// Ephemeral port range used for client source ports
const EPHEMERAL_PORT_RANGE: std::ops::RangeInclusive<u16> = 49152..=65535;

/// Subnet used when no internal subnets are configured: 10.0.0.0/8
const FALLBACK_SUBNET: Cidr = Cidr {
    base: 0x0a00_0000,
    prefix_len: 8,
};

/// A parsed IPv4 CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cidr {
    base: u32,
    prefix_len: u8,
}

impl Cidr {
    /// Number of addresses covered by this block
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix_len)
    }

    /// Draw a uniformly random address from the block.
    ///
    /// Network and broadcast addresses are not excluded; the output is
    /// synthetic log text, not routable traffic.
    pub fn random_addr<R: Rng>(&self, rng: &mut R) -> Ipv4Addr {
        let host_bits = 32 - self.prefix_len;
        let offset = if host_bits == 0 {
            0
        } else {
            rng.gen_range(0..self.size()) as u32
        };
        Ipv4Addr::from(self.base | offset)
    }
}

/// Parse an IPv4 CIDR string like "10.0.0.0/8".
pub fn parse_cidr(s: &str) -> anyhow::Result<Cidr> {
    let (addr_part, prefix_part) = s
        .split_once('/')
        .with_context(|| format!("CIDR missing prefix length: {}", s))?;

    let addr: Ipv4Addr = addr_part
        .parse()
        .with_context(|| format!("Invalid IPv4 address in CIDR: {}", s))?;
    let prefix_len: u8 = prefix_part
        .parse()
        .with_context(|| format!("Invalid prefix length in CIDR: {}", s))?;

    if prefix_len > 32 {
        anyhow::bail!("Prefix length out of range in CIDR: {}", s);
    }

    let mask = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - prefix_len)
    };

    Ok(Cidr {
        base: u32::from(addr) & mask,
        prefix_len,
    })
}

/// Allocates network attributes for synthesized traffic events.
///
/// Stateless between calls: every draw is independent given the configured
/// subnets and the caller's RNG.
#[derive(Debug, Clone)]
pub struct AddrAllocator {
    internal_subnets: Vec<Cidr>,
}

impl AddrAllocator {
    /// Build an allocator from CIDR strings; falls back to 10.0.0.0/8 when
    /// no subnets are configured.
    pub fn new(internal_subnets: &[String]) -> anyhow::Result<Self> {
        let subnets = if internal_subnets.is_empty() {
            vec![parse_cidr("10.0.0.0/8")?]
        } else {
            internal_subnets
                .iter()
                .map(|s| parse_cidr(s))
                .collect::<anyhow::Result<Vec<_>>>()?
        };

        Ok(Self {
            internal_subnets: subnets,
        })
    }

    /// Draw an internal (client) address from the configured subnets.
    pub fn internal_ip<R: Rng>(&self, rng: &mut R) -> Ipv4Addr {
        let subnet = self
            .internal_subnets
            .choose(rng)
            .unwrap_or(&FALLBACK_SUBNET);
        subnet.random_addr(rng)
    }

    /// Draw a destination address, preferring the service's declared ranges.
    ///
    /// Invalid declared ranges are skipped rather than failing the event;
    /// with no usable range the generic external pool is used.
    pub fn destination_ip<R: Rng>(&self, rng: &mut R, ip_ranges: &[String]) -> Ipv4Addr {
        let parsed: Vec<Cidr> = ip_ranges.iter().filter_map(|s| parse_cidr(s).ok()).collect();

        if let Some(range) = parsed.choose(rng) {
            return range.random_addr(rng);
        }

        self.external_ip(rng)
    }

    /// Draw a generic external address, avoiding RFC 1918 space.
    pub fn external_ip<R: Rng>(&self, rng: &mut R) -> Ipv4Addr {
        loop {
            let addr = Ipv4Addr::new(
                rng.gen_range(1..224),
                rng.gen_range(0..=255),
                rng.gen_range(0..=255),
                rng.gen_range(1..255),
            );
            if !addr.is_private() && !addr.is_loopback() {
                return addr;
            }
        }
    }

    /// Draw a client source port from the ephemeral range.
    pub fn source_port<R: Rng>(&self, rng: &mut R) -> u16 {
        rng.gen_range(EPHEMERAL_PORT_RANGE)
    }

    /// Resolve the destination port for a protocol name.
    pub fn destination_port(&self, protocol: &str) -> u16 {
        match protocol {
            "http" => 80,
            "https" => 443,
            "ftp" => 21,
            "ssh" => 22,
            "smtp" => 25,
            "dns" => 53,
            _ => 443,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_parse_cidr() {
        let cidr = parse_cidr("10.0.0.0/8").unwrap();
        assert_eq!(cidr.size(), 1 << 24);

        let cidr = parse_cidr("192.168.1.0/24").unwrap();
        assert_eq!(cidr.size(), 256);

        // Base is masked down to the network address
        let cidr = parse_cidr("10.1.2.3/16").unwrap();
        assert_eq!(cidr.random_addr(&mut StdRng::seed_from_u64(1)).octets()[0], 10);
        assert_eq!(cidr.random_addr(&mut StdRng::seed_from_u64(1)).octets()[1], 1);

        assert!(parse_cidr("10.0.0.0").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("not-an-ip/8").is_err());
    }

    #[test]
    fn test_internal_ip_within_subnet() {
        let allocator = AddrAllocator::new(&["10.20.0.0/16".to_string()]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..100 {
            let ip = allocator.internal_ip(&mut rng);
            let octets = ip.octets();
            assert_eq!(octets[0], 10);
            assert_eq!(octets[1], 20);
        }
    }

    #[test]
    fn test_default_subnet_when_unconfigured() {
        let allocator = AddrAllocator::new(&[]).unwrap();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            assert_eq!(allocator.internal_ip(&mut rng).octets()[0], 10);
        }
    }

    #[test]
    fn test_destination_ip_prefers_service_ranges() {
        let allocator = AddrAllocator::new(&[]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let ranges = vec!["162.125.0.0/16".to_string()];

        for _ in 0..50 {
            let ip = allocator.destination_ip(&mut rng, &ranges);
            assert_eq!(ip.octets()[0], 162);
            assert_eq!(ip.octets()[1], 125);
        }
    }

    #[test]
    fn test_destination_ip_falls_back_on_bad_ranges() {
        let allocator = AddrAllocator::new(&[]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let ranges = vec!["garbage".to_string()];

        for _ in 0..50 {
            let ip = allocator.destination_ip(&mut rng, &ranges);
            assert!(!ip.is_private());
        }
    }

    #[test]
    fn test_external_ip_never_private() {
        let allocator = AddrAllocator::new(&[]).unwrap();
        let mut rng = StdRng::seed_from_u64(99);

        for _ in 0..200 {
            let ip = allocator.external_ip(&mut rng);
            assert!(!ip.is_private());
            assert!(!ip.is_loopback());
        }
    }

    #[test]
    fn test_source_port_ephemeral_range() {
        let allocator = AddrAllocator::new(&[]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        for _ in 0..100 {
            let port = allocator.source_port(&mut rng);
            assert!(port >= 49152);
        }
    }

    #[test]
    fn test_destination_port_table() {
        let allocator = AddrAllocator::new(&[]).unwrap();
        assert_eq!(allocator.destination_port("https"), 443);
        assert_eq!(allocator.destination_port("http"), 80);
        assert_eq!(allocator.destination_port("ssh"), 22);
        assert_eq!(allocator.destination_port("gopher"), 443);
    }
}
