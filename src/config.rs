//! TOML manifest describing the desired state of one host.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::build::ClientTools;
use crate::error::Error;
use crate::platform::PlatformContext;
use crate::server::ServerConf;
use crate::target::{DatabaseTarget, ExtensionTarget, RoleTarget};

pub const CONFIG_ENV: &str = "PGCONVERGE_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseAction { Create, Drop }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleAction { Create, Update, Drop, Grant }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionAction { Create, Drop }

/// `action = "drop"` or `action = ["create", "grant"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Actions<A> {
    One(A),
    Many(Vec<A>),
}

impl<A: Copy> Actions<A> {
    pub fn to_vec(&self) -> Vec<A> {
        match self {
            Actions::One(a) => vec![*a],
            Actions::Many(v) => v.clone(),
        }
    }
}

const DATABASE_KEYS: &[&str] = &["action", "name", "database", "template", "encoding", "locale", "owner", "conn"];
const ROLE_KEYS: &[&str] = &[
    "action", "name", "create_user", "superuser", "createdb", "createrole", "inherit", "replication", "login",
    "password", "encrypted_password", "valid_until", "attributes", "database", "privileges", "conn",
];
const EXTENSION_KEYS: &[&str] =
    &["action", "name", "extension", "old_version", "source_directory", "version", "database", "conn"];

fn create_db() -> Actions<DatabaseAction> { Actions::One(DatabaseAction::Create) }
fn create_role() -> Actions<RoleAction> { Actions::One(RoleAction::Create) }
fn create_ext() -> Actions<ExtensionAction> { Actions::One(ExtensionAction::Create) }

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseEntry {
    #[serde(default = "create_db")]
    pub action: Actions<DatabaseAction>,
    #[serde(flatten)]
    pub target: DatabaseTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    #[serde(default = "create_role")]
    pub action: Actions<RoleAction>,
    #[serde(flatten)]
    pub target: RoleTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionEntry {
    #[serde(default = "create_ext")]
    pub action: Actions<ExtensionAction>,
    #[serde(flatten)]
    pub target: ExtensionTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub platform: PlatformContext,
    #[serde(default)]
    pub tools: ClientTools,
    #[serde(default, rename = "database")]
    pub databases: Vec<DatabaseEntry>,
    #[serde(default, rename = "role")]
    pub roles: Vec<RoleEntry>,
    #[serde(default, rename = "extension")]
    pub extensions: Vec<ExtensionEntry>,
    #[serde(default)]
    pub server: Option<ServerConf>,
}

// Flattened entries cannot carry deny_unknown_fields, so their keys are
// checked against these lists before the typed parse.
fn check_entry_keys(doc: &toml::Table) -> Result<(), Error> {
    for (section, known) in [("database", DATABASE_KEYS), ("role", ROLE_KEYS), ("extension", EXTENSION_KEYS)] {
        let Some(entries) = doc.get(section).and_then(toml::Value::as_array) else { continue };
        for (i, entry) in entries.iter().enumerate() {
            let Some(table) = entry.as_table() else { continue };
            if let Some(key) = table.keys().find(|k| !known.contains(&k.as_str())) {
                return Err(Error::Config(format!("unknown key `{}` in [[{}]] entry {}", key, section, i + 1)));
            }
        }
    }
    Ok(())
}

impl Manifest {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        let doc: toml::Table = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        check_entry_keys(&doc)?;
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        let manifest = Self::from_toml_str(&raw).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded manifest");
        Ok(manifest)
    }

    /// The managed server's data directory: `server.data_directory` when
    /// given, otherwise the platform default.
    pub fn data_dir(&self) -> String {
        match &self.server {
            Some(server) => server.resolve(&self.platform).data_directory,
            None => self.platform.data_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformFamily;
    use crate::target::AttributeValue;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [platform]
        family = "rhel"
        version = "12"

        [tools]
        psql = "/usr/pgsql-12/bin/psql"

        [[database]]
        database = "app"
        owner = "app"
        encoding = "UTF8"

        [[database]]
        name = "legacy"
        action = "drop"

        [[role]]
        create_user = "app"
        password = "pw"
        createdb = true
        database = "app"
        privileges = ["CONNECT", "TEMPORARY"]
        action = ["create", "grant"]

        [[role]]
        name = "reporting"
        action = "update"
        [role.attributes]
        statement_timeout = "30s"

        [[extension]]
        extension = "pgcrypto"
        database = "app"

        [server]
        version = "12"
        [server.additional_config]
        max_connections = 200
    "#;

    #[test]
    fn parses_full_manifest() {
        let m = Manifest::from_toml_str(SAMPLE).unwrap();
        assert_eq!(m.platform.family, PlatformFamily::Rhel);
        assert_eq!(m.tools.psql, "/usr/pgsql-12/bin/psql");
        assert_eq!(m.tools.createdb, "createdb");

        assert_eq!(m.databases.len(), 2);
        assert_eq!(m.databases[0].action.to_vec(), vec![DatabaseAction::Create]);
        assert_eq!(m.databases[0].target.name, "app");
        assert_eq!(m.databases[0].target.template, "template1");
        assert_eq!(m.databases[1].action.to_vec(), vec![DatabaseAction::Drop]);

        let app = &m.roles[0];
        assert_eq!(app.action.to_vec(), vec![RoleAction::Create, RoleAction::Grant]);
        assert!(app.target.flags.createdb);
        assert!(app.target.flags.login);
        assert_eq!(app.target.privileges, vec!["CONNECT", "TEMPORARY"]);
        assert_eq!(
            m.roles[1].target.attributes.get("statement_timeout"),
            Some(&AttributeValue::Text("30s".into()))
        );

        assert_eq!(m.extensions[0].target.name, "pgcrypto");
        let server = m.server.unwrap();
        assert_eq!(server.additional_config.get("max_connections"), Some(&AttributeValue::Int(200)));
    }

    #[test]
    fn missing_platform_is_config_error() {
        assert!(matches!(Manifest::from_toml_str("[[database]]\nname = \"app\"\n"), Err(Error::Config(_))));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let raw = "[platform]\nfamily = \"debian\"\n[[database]]\nname = \"app\"\naction = \"rename\"\n";
        assert!(Manifest::from_toml_str(raw).is_err());
    }

    #[test]
    fn unknown_entry_key_is_rejected() {
        let raw = "[platform]\nfamily = \"debian\"\n[[database]]\nname = \"app\"\n[[database]]\nname = \"b\"\nownr = \"x\"\n";
        match Manifest::from_toml_str(raw) {
            Err(Error::Config(msg)) => assert_eq!(msg, "unknown key `ownr` in [[database]] entry 2"),
            other => panic!("unexpected {:?}", other),
        }
        let raw = "[platform]\nfamily = \"debian\"\n[[role]]\nname = \"app\"\nsuperuserr = true\n";
        assert!(matches!(Manifest::from_toml_str(raw), Err(Error::Config(_))));
    }

    #[test]
    fn every_entry_key_is_accepted() {
        let raw = r#"
            [platform]
            family = "debian"

            [[database]]
            action = "create"
            database = "app"
            template = ""
            encoding = "UTF8"
            locale = "C"
            owner = "app"
            [database.conn]
            port = 5433

            [[role]]
            create_user = "app"
            superuser = false
            createdb = true
            createrole = false
            inherit = true
            replication = false
            login = true
            password = "pw"
            encrypted_password = "md5abc"
            valid_until = "2030-01-01"
            database = "app"
            privileges = ["CONNECT"]
            [role.attributes]
            work_mem = "8MB"
            [role.conn]
            peer = true

            [[extension]]
            extension = "hstore"
            old_version = "1.0"
            source_directory = "/opt/ext"
            version = "--1.1"
            database = "app"
            [extension.conn]
            user = "postgres"
        "#;
        let m = Manifest::from_toml_str(raw).unwrap();
        assert_eq!(m.databases[0].target.conn.port, Some(5433));
        assert!(m.roles[0].target.conn.peer);
        assert_eq!(m.extensions[0].target.version, "--1.1");
    }

    #[test]
    fn data_dir_prefers_server_setting() {
        let mut m = Manifest::from_toml_str("[platform]\nfamily = \"debian\"\n").unwrap();
        assert_eq!(m.data_dir(), "/var/lib/postgresql/9.6/main");
        m.server = Some(ServerConf { data_directory: Some("/srv/pgdata".into()), ..Default::default() });
        assert_eq!(m.data_dir(), "/srv/pgdata");
    }

    #[test]
    fn load_reports_path() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[platform]\nfamily = \"debian\"").unwrap();
        let m = Manifest::load(f.path()).unwrap();
        assert_eq!(m.platform.version, "9.6");
        assert!(m.databases.is_empty());

        let missing = f.path().with_extension("missing");
        match Manifest::load(&missing) {
            Err(Error::Config(msg)) => assert!(msg.contains("missing")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
