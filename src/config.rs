use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

use crate::dtls_srtp::DtlsRole;
use crate::log::LogLevel;
use crate::pipeline::Policies;
use crate::srtp::SrtpProfile;
use crate::stream::{DirectionSelection, EndpointFilter};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// INI-style key/value file: `[Section]` headers, `key = value` lines,
/// `#` comments. Keys before the first section are globals.
#[derive(Debug, Default)]
pub struct Config {
    pub globals: HashMap<String, String>,
    pub sections: HashMap<String, HashMap<String, String>>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut globals = HashMap::new();
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current_section: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with('[') && line.ends_with(']') {
                let name = &line[1..line.len() - 1];
                current_section = Some(name.trim().to_string());
                continue;
            }

            if let Some(pos) = line.find('=') {
                let key = line[..pos].trim().to_string();
                let value = line[pos + 1..].trim().trim_matches('"').to_string();

                match &current_section {
                    None => {
                        globals.insert(key, value);
                    }
                    Some(sec) => {
                        sections.entry(sec.clone()).or_default().insert(key, value);
                    }
                }
            }
        }
        Config { globals, sections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|sec| sec.get(key))
            .map(|s| s.as_str())
    }

    #[must_use]
    pub fn get_non_empty(&self, section: &str, key: &str) -> Option<&str> {
        self.get(section, key).filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn get_global(&self, key: &str) -> Option<&str> {
        self.globals.get(key).map(|s| s.as_str())
    }

    /// Parses `[section] key` with `T`'s `FromStr`, `None` when unset or empty.
    pub fn parse_value<T>(&self, section: &str, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr<Err = String>,
    {
        let Some(raw) = self.get_non_empty(section, key) else {
            return Ok(None);
        };
        raw.parse().map(Some).map_err(|reason| ConfigError::InvalidValue {
            key: format!("[{section}] {key}"),
            value: raw.to_string(),
            reason,
        })
    }
}

/// Everything one decryption run needs besides the keys and the capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub profile: SrtpProfile,
    pub dtls_role: DtlsRole,
    pub direction: DirectionSelection,
    pub policies: Policies,
    /// Destination filter of the inbound stream (our receiving endpoint).
    pub inbound: EndpointFilter,
    /// Destination filter of the outbound stream (the peer's receiving endpoint).
    pub outbound: EndpointFilter,
    pub log_level: LogLevel,
    pub log_path: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            profile: SrtpProfile::default(),
            dtls_role: DtlsRole::default(),
            direction: DirectionSelection::default(),
            policies: Policies::default(),
            inbound: EndpointFilter::ANY,
            outbound: EndpointFilter::ANY,
            log_level: LogLevel::Info,
            log_path: None,
        }
    }
}

impl RunConfig {
    /// Defaults overridden by whatever `config` sets.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut run = Self::default();

        if let Some(v) = config.parse_value("Srtp", "profile")? {
            run.profile = v;
        }
        if let Some(v) = config.parse_value("Srtp", "role")? {
            run.dtls_role = v;
        }
        if let Some(v) = config.parse_value("Srtp", "direction")? {
            run.direction = v;
        }

        if let Some(v) = config.parse_value("Policy", "unknown")? {
            run.policies.unknown = v;
        }
        if let Some(v) = config.parse_value("Policy", "malformed")? {
            run.policies.malformed = v;
        }
        if let Some(v) = config.parse_value("Policy", "streamless")? {
            run.policies.streamless = v;
        }

        if let Some(v) = config.parse_value("Endpoints", "inbound")? {
            run.inbound = v;
        }
        if let Some(v) = config.parse_value("Endpoints", "outbound")? {
            run.outbound = v;
        }

        if let Some(v) = config.parse_value("Logging", "level")? {
            run.log_level = v;
        }
        if let Some(path) = config.get_non_empty("Logging", "path") {
            run.log_path = Some(PathBuf::from(path));
        }

        Ok(run)
    }
}
