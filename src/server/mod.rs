//! Server configuration values resolved against the platform.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::conn::ConnectionSpec;
use crate::platform::{PlatformContext, DEFAULT_VERSION};
use crate::target::AttributeValue;

fn default_version() -> String { DEFAULT_VERSION.to_string() }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConf {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub data_directory: Option<String>,
    #[serde(default)]
    pub hba_file: Option<String>,
    #[serde(default)]
    pub ident_file: Option<String>,
    #[serde(default)]
    pub external_pid_file: Option<String>,
    #[serde(default)]
    pub stats_temp_directory: Option<String>,
    #[serde(default)]
    pub additional_config: BTreeMap<String, AttributeValue>,
    /// Database the restart check connects to.
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub conn: ConnectionSpec,
}

impl Default for ServerConf {
    fn default() -> Self {
        ServerConf {
            version: default_version(),
            data_directory: None,
            hba_file: None,
            ident_file: None,
            external_pid_file: None,
            stats_temp_directory: None,
            additional_config: BTreeMap::new(),
            database: None,
            conn: ConnectionSpec::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerSettings {
    pub data_directory: String,
    pub hba_file: String,
    pub ident_file: String,
    pub external_pid_file: String,
    pub stats_temp_directory: String,
    pub port: String,
    /// `additional_config` entries that are not one of the settings above.
    pub custom: BTreeMap<String, String>,
}

impl ServerSettings {
    fn slot(&mut self, key: &str) -> Option<&mut String> {
        match key {
            "data_directory" => Some(&mut self.data_directory),
            "hba_file" => Some(&mut self.hba_file),
            "ident_file" => Some(&mut self.ident_file),
            "external_pid_file" => Some(&mut self.external_pid_file),
            "stats_temp_directory" => Some(&mut self.stats_temp_directory),
            "port" => Some(&mut self.port),
            _ => None,
        }
    }
}

impl ServerConf {
    /// Fill unset paths from the platform and fold in `additional_config`.
    pub fn resolve(&self, ctx: &PlatformContext) -> ServerSettings {
        let ctx = ctx.with_version(self.version.as_str());
        let conf_dir = ctx.conf_dir();
        let v = &self.version;
        let mut settings = ServerSettings {
            data_directory: self.data_directory.clone().unwrap_or_else(|| ctx.data_dir()),
            hba_file: self.hba_file.clone().unwrap_or_else(|| format!("{}/pg_hba.conf", conf_dir)),
            ident_file: self.ident_file.clone().unwrap_or_else(|| format!("{}/pg_ident.conf", conf_dir)),
            external_pid_file: self
                .external_pid_file
                .clone()
                .unwrap_or_else(|| format!("/var/run/postgresql/{}-main.pid", v)),
            stats_temp_directory: self
                .stats_temp_directory
                .clone()
                .unwrap_or_else(|| format!("/var/run/postgresql/{}-main.pg_stat_tmp", v)),
            port: self.conn.port_or_default().to_string(),
            custom: BTreeMap::new(),
        };
        for (key, value) in &self.additional_config {
            let value = value.to_string();
            match settings.slot(key) {
                Some(slot) => *slot = value,
                None => { settings.custom.insert(key.clone(), value); }
            }
        }
        settings
    }
}
