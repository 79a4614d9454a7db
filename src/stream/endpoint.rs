use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    str::FromStr,
};

/// Address/port filter of a stream. `None` is a wildcard on that component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndpointFilter {
    pub address: Option<IpAddr>,
    pub port: Option<u16>,
}

impl EndpointFilter {
    pub const ANY: EndpointFilter = EndpointFilter {
        address: None,
        port: None,
    };

    pub fn new(address: Option<IpAddr>, port: Option<u16>) -> Self {
        Self { address, port }
    }

    pub fn exact(addr: SocketAddr) -> Self {
        Self::new(Some(addr.ip()), Some(addr.port()))
    }

    /// IPv4-mapped IPv6 addresses compare equal to their IPv4 form.
    pub fn matches(&self, endpoint: &SocketAddr) -> bool {
        let addr_ok = self
            .address
            .is_none_or(|a| a.to_canonical() == endpoint.ip().to_canonical());
        let port_ok = self.port.is_none_or(|p| p == endpoint.port());
        addr_ok && port_ok
    }

    /// 0 for `*`, 1 for a port only, 2 for an address only, 3 for both.
    pub fn specificity(&self) -> u8 {
        (self.address.is_some() as u8) * 2 + self.port.is_some() as u8
    }

    pub fn is_wildcard(&self) -> bool {
        self.address.is_none() && self.port.is_none()
    }
}

impl fmt::Display for EndpointFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.address, self.port) {
            (None, None) => f.write_str("*"),
            (Some(IpAddr::V6(a)), port) => match port {
                Some(p) => write!(f, "[{a}]:{p}"),
                None => write!(f, "[{a}]:*"),
            },
            (Some(a), Some(p)) => write!(f, "{a}:{p}"),
            (Some(a), None) => write!(f, "{a}:*"),
            (None, Some(p)) => write!(f, "*:{p}"),
        }
    }
}

impl FromStr for EndpointFilter {
    type Err = String;

    /// `ADDR:PORT`, `[V6]:PORT`, `ADDR`, `*:PORT`, `ADDR:*` or `*`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "*" {
            return Ok(Self::ANY);
        }

        // Bare address, including unbracketed IPv6.
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Ok(Self::new(Some(ip), None));
        }

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| format!("missing ']' in endpoint '{s}'"))?;
            let port = match tail {
                "" => None,
                t => Some(
                    t.strip_prefix(':')
                        .ok_or_else(|| format!("expected ':' after ']' in endpoint '{s}'"))?,
                ),
            };
            (host, port)
        } else {
            match s.rsplit_once(':') {
                Some((h, p)) => (h, Some(p)),
                None => (s, None),
            }
        };

        let address = match host {
            "*" | "" => None,
            h => Some(
                h.parse::<IpAddr>()
                    .map_err(|_| format!("invalid address '{h}' in endpoint '{s}'"))?,
            ),
        };
        let port = match port {
            None | Some("*") => None,
            Some(p) => Some(
                p.parse::<u16>()
                    .map_err(|_| format!("invalid port '{p}' in endpoint '{s}'"))?,
            ),
        };

        Ok(Self::new(address, port))
    }
}
