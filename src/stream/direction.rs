use std::{fmt, str::FromStr};

/// Which way a stream's packets travel, seen from the capturing host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Received by the capturing host; protected with the remote keys.
    Inbound,
    /// Sent by the capturing host; protected with the local keys.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Inbound => f.write_str("inbound"),
            Direction::Outbound => f.write_str("outbound"),
        }
    }
}

/// Directions a run decrypts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectionSelection {
    Inbound,
    Outbound,
    #[default]
    Both,
}

impl DirectionSelection {
    /// Selected directions, inbound first.
    pub fn directions(self) -> &'static [Direction] {
        match self {
            DirectionSelection::Inbound => &[Direction::Inbound],
            DirectionSelection::Outbound => &[Direction::Outbound],
            DirectionSelection::Both => &[Direction::Inbound, Direction::Outbound],
        }
    }
}

impl fmt::Display for DirectionSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionSelection::Inbound => f.write_str("inbound"),
            DirectionSelection::Outbound => f.write_str("outbound"),
            DirectionSelection::Both => f.write_str("both"),
        }
    }
}

impl FromStr for DirectionSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbound" | "in" => Ok(DirectionSelection::Inbound),
            "outbound" | "out" => Ok(DirectionSelection::Outbound),
            "both" => Ok(DirectionSelection::Both),
            other => Err(format!(
                "unknown direction '{other}' (expected inbound, outbound or both)"
            )),
        }
    }
}
