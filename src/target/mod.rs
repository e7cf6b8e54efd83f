//! Desired-state descriptions for databases, roles and extensions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conn::ConnectionSpec;

pub const DEFAULT_TEMPLATE: &str = "template1";
pub const DEFAULT_EXTENSION_VERSION: &str = "--1.0";

fn default_template() -> String { DEFAULT_TEMPLATE.to_string() }
fn default_extension_version() -> String { DEFAULT_EXTENSION_VERSION.to_string() }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTarget {
    #[serde(alias = "database")]
    pub name: String,
    /// An empty template means "let createdb pick".
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub conn: ConnectionSpec,
}

impl DatabaseTarget {
    pub fn new(name: impl Into<String>) -> Self {
        DatabaseTarget {
            name: name.into(),
            template: default_template(),
            encoding: None,
            locale: None,
            owner: None,
            conn: ConnectionSpec::default(),
        }
    }

    /// Copy with the connection password resolved, see [`ConnectionSpec::effective`].
    pub fn resolved(&self) -> Self { DatabaseTarget { conn: self.conn.effective(), ..self.clone() } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleFlags {
    pub superuser: bool,
    pub createdb: bool,
    pub createrole: bool,
    pub inherit: bool,
    pub replication: bool,
    pub login: bool,
}

impl Default for RoleFlags {
    fn default() -> Self {
        RoleFlags { superuser: false, createdb: false, createrole: false, inherit: true, replication: false, login: true }
    }
}

impl RoleFlags {
    /// Keyword and state, in the order role clauses list them.
    pub fn ordered(&self) -> [(&'static str, bool); 6] {
        [
            ("SUPERUSER", self.superuser),
            ("CREATEDB", self.createdb),
            ("CREATEROLE", self.createrole),
            ("INHERIT", self.inherit),
            ("REPLICATION", self.replication),
            ("LOGIN", self.login),
        ]
    }
}

/// Value of a per-role configuration parameter (`ALTER ROLE .. SET`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Text(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTarget {
    #[serde(alias = "create_user")]
    pub name: String,
    #[serde(flatten)]
    pub flags: RoleFlags,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub encrypted_password: Option<String>,
    #[serde(default)]
    pub valid_until: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub privileges: Vec<String>,
    #[serde(default)]
    pub conn: ConnectionSpec,
}

impl RoleTarget {
    pub fn new(name: impl Into<String>) -> Self {
        RoleTarget {
            name: name.into(),
            flags: RoleFlags::default(),
            password: None,
            encrypted_password: None,
            valid_until: None,
            attributes: BTreeMap::new(),
            database: None,
            privileges: Vec::new(),
            conn: ConnectionSpec::default(),
        }
    }

    pub fn resolved(&self) -> Self { RoleTarget { conn: self.conn.effective(), ..self.clone() } }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionTarget {
    #[serde(alias = "extension")]
    pub name: String,
    #[serde(default)]
    pub old_version: Option<String>,
    #[serde(default)]
    pub source_directory: Option<String>,
    #[serde(default = "default_extension_version")]
    pub version: String,
    pub database: String,
    #[serde(default)]
    pub conn: ConnectionSpec,
}

impl ExtensionTarget {
    pub fn new(name: impl Into<String>, database: impl Into<String>) -> Self {
        ExtensionTarget {
            name: name.into(),
            old_version: None,
            source_directory: None,
            version: default_extension_version(),
            database: database.into(),
            conn: ConnectionSpec::default(),
        }
    }

    pub fn resolved(&self) -> Self { ExtensionTarget { conn: self.conn.effective(), ..self.clone() } }
}
