use std::{fmt, str::FromStr};

/// What to do with a packet that is not RTP or RTCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownPolicy {
    Drop,
    #[default]
    Pass,
}

/// What to do with an RTP/RTCP packet no stream accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamlessPolicy {
    Drop,
    #[default]
    Pass,
}

/// What to do when a selected stream fails to authenticate or parse a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    #[default]
    Drop,
    /// Emit the original, still protected, packet.
    Pass,
    /// Abort the whole run.
    Raise,
}

/// Per-category policies, applied in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Policies {
    pub unknown: UnknownPolicy,
    pub streamless: StreamlessPolicy,
    pub malformed: MalformedPolicy,
}

fn parse_choice<T: Copy>(s: &str, what: &str, choices: &[(&str, T)]) -> Result<T, String> {
    let norm = s.trim().to_ascii_lowercase();
    choices
        .iter()
        .find(|(name, _)| *name == norm)
        .map(|(_, v)| *v)
        .ok_or_else(|| {
            let names: Vec<&str> = choices.iter().map(|(n, _)| *n).collect();
            format!(
                "invalid {what} policy '{}' (expected {})",
                s.trim(),
                names.join(" or ")
            )
        })
}

impl FromStr for UnknownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(s, "unknown", &[("drop", Self::Drop), ("pass", Self::Pass)])
    }
}

impl FromStr for StreamlessPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(s, "streamless", &[("drop", Self::Drop), ("pass", Self::Pass)])
    }
}

impl FromStr for MalformedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_choice(
            s,
            "malformed",
            &[("drop", Self::Drop), ("pass", Self::Pass), ("raise", Self::Raise)],
        )
    }
}

macro_rules! display_lowercase {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($name),)+
                }
            }
        }
    };
}

display_lowercase!(UnknownPolicy { Drop => "drop", Pass => "pass" });
display_lowercase!(StreamlessPolicy { Drop => "drop", Pass => "pass" });
display_lowercase!(MalformedPolicy { Drop => "drop", Pass => "pass", Raise => "raise" });

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn defaults() {
        let p = Policies::default();
        assert_eq!(p.unknown, UnknownPolicy::Pass);
        assert_eq!(p.streamless, StreamlessPolicy::Pass);
        assert_eq!(p.malformed, MalformedPolicy::Drop);
    }

    #[test]
    fn parses_and_displays() {
        assert_eq!(" RAISE ".parse::<MalformedPolicy>().unwrap(), MalformedPolicy::Raise);
        assert_eq!("drop".parse::<StreamlessPolicy>().unwrap().to_string(), "drop");
        let err = "raise".parse::<UnknownPolicy>().unwrap_err();
        assert!(err.contains("drop or pass"), "{err}");
    }
}
