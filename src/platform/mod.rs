//! Platform-derived paths and service names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub const DEFAULT_VERSION: &str = "9.6";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Rhel,
    Fedora,
    Amazon,
    Debian,
}

impl FromStr for PlatformFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rhel" => Ok(PlatformFamily::Rhel),
            "fedora" => Ok(PlatformFamily::Fedora),
            "amazon" => Ok(PlatformFamily::Amazon),
            "debian" => Ok(PlatformFamily::Debian),
            other => Err(Error::InvalidArgument(format!("unsupported platform family: {}", other))),
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlatformFamily::Rhel => "rhel",
            PlatformFamily::Fedora => "fedora",
            PlatformFamily::Amazon => "amazon",
            PlatformFamily::Debian => "debian",
        };
        f.write_str(s)
    }
}

fn default_version() -> String { DEFAULT_VERSION.to_string() }

/// Everything path derivation needs to know about the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlatformContext {
    pub family: PlatformFamily,
    #[serde(default = "default_version")]
    pub version: String,
    /// Virtualization system, e.g. `docker`.
    #[serde(default)]
    pub virtualization: Option<String>,
}

impl PlatformContext {
    pub fn new(family: PlatformFamily, version: impl Into<String>) -> Self {
        PlatformContext { family, version: version.into(), virtualization: None }
    }

    pub fn in_container(&self) -> bool { self.virtualization.as_deref() == Some("docker") }

    /// Same host, different server version.
    pub fn with_version(&self, version: impl Into<String>) -> Self {
        PlatformContext { version: version.into(), ..self.clone() }
    }

    fn compact_version(&self) -> String { self.version.replace('.', "") }

    pub fn data_dir(&self) -> String {
        match self.family {
            PlatformFamily::Rhel | PlatformFamily::Fedora => format!("/var/lib/pgsql/{}/data", self.version),
            PlatformFamily::Amazon if self.in_container() => format!("/var/lib/pgsql{}/data", self.compact_version()),
            PlatformFamily::Amazon => format!("/var/lib/pgsql/{}/data", self.version),
            PlatformFamily::Debian => format!("/var/lib/postgresql/{}/main", self.version),
        }
    }

    pub fn conf_dir(&self) -> String {
        match self.family {
            PlatformFamily::Rhel | PlatformFamily::Fedora | PlatformFamily::Amazon => self.data_dir(),
            PlatformFamily::Debian => format!("/etc/postgresql/{}/main", self.version),
        }
    }

    pub fn service_name(&self) -> String {
        match self.family {
            PlatformFamily::Rhel | PlatformFamily::Fedora => format!("postgresql-{}", self.version),
            PlatformFamily::Amazon if self.in_container() => format!("postgresql{}", self.compact_version()),
            PlatformFamily::Amazon => format!("postgresql-{}", self.version),
            PlatformFamily::Debian => "postgresql".to_string(),
        }
    }

    /// Where the server looks for extension control files.
    pub fn extension_dir(&self) -> String {
        match self.family {
            PlatformFamily::Debian => format!("/usr/share/postgresql/{}/extension", self.version),
            _ => format!("/usr/pgsql-{}/share/extension", self.version),
        }
    }
}
