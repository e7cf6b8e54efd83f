//! Command builders: targets in, pipelines out. Nothing here executes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cmd::{CommandSpec, PipelineSpec};
use crate::conn::{build_client_invocation, ConnectionSpec};
use crate::error::Error;
use crate::sql;
use crate::target::{DatabaseTarget, ExtensionTarget, RoleTarget};

/// Paths of the client executables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientTools {
    pub psql: String,
    pub createdb: String,
    pub dropdb: String,
    pub grep: String,
}

impl Default for ClientTools {
    fn default() -> Self {
        ClientTools {
            psql: "/usr/bin/psql".into(),
            createdb: "createdb".into(),
            dropdb: "dropdb".into(),
            grep: "grep".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PsqlOptions<'a> {
    pub database: Option<&'a str>,
    pub grep: Option<&'a str>,
    /// Unaligned, tuples-only output (`-At`).
    pub concise: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    pub tools: ClientTools,
}

impl CommandBuilder {
    pub fn new(tools: ClientTools) -> Self { CommandBuilder { tools } }

    fn client(&self, program: &str, conn: &ConnectionSpec) -> CommandSpec {
        let cmd = build_client_invocation(program, conn);
        let sensitive = conn.uses_password();
        cmd.sensitive(sensitive)
    }

    fn with_login(cmd: CommandSpec, conn: &ConnectionSpec) -> CommandSpec {
        cmd.args(["-U", conn.user_or_default()]).args(["-p".to_string(), conn.port_or_default().to_string()])
    }

    pub fn psql(&self, conn: &ConnectionSpec, sql: &str, opts: PsqlOptions<'_>) -> PipelineSpec {
        let mut cmd = self.client(&self.tools.psql, conn);
        if opts.concise {
            cmd = cmd.arg("-At");
        }
        cmd = Self::with_login(cmd.args(["-c", sql]), conn);
        if let Some(db) = opts.database {
            cmd = cmd.args(["-d", db]);
        }
        let mut pipe = PipelineSpec::from(cmd);
        if let Some(filter) = opts.grep {
            pipe.push(CommandSpec::new(self.tools.grep.as_str()).args(["--", filter]));
        }
        pipe
    }

    pub fn create_database(&self, db: &DatabaseTarget) -> PipelineSpec {
        let mut cmd = Self::with_login(self.client(&self.tools.createdb, &db.conn), &db.conn);
        if let Some(e) = &db.encoding { cmd = cmd.args(["-E", e.as_str()]); }
        if let Some(l) = &db.locale { cmd = cmd.args(["-l", l.as_str()]); }
        if !db.template.is_empty() { cmd = cmd.args(["-T", db.template.as_str()]); }
        if let Some(o) = &db.owner { cmd = cmd.args(["-O", o.as_str()]); }
        cmd.arg(db.name.as_str()).into()
    }

    pub fn drop_database(&self, db: &DatabaseTarget) -> PipelineSpec {
        Self::with_login(self.client(&self.tools.dropdb, &db.conn), &db.conn)
            .arg(db.name.as_str())
            .into()
    }

    fn role_psql(&self, role: &RoleTarget, sql: &str) -> PipelineSpec {
        let opts = PsqlOptions { database: role.database.as_deref(), ..Default::default() };
        let mut pipe = self.psql(&role.conn, sql, opts);
        for c in &mut pipe.0 {
            c.flags.sensitive = true;
        }
        pipe
    }

    pub fn create_role(&self, role: &RoleTarget) -> PipelineSpec {
        self.role_psql(role, &sql::create_role_sql(role))
    }

    pub fn update_role(&self, role: &RoleTarget) -> PipelineSpec {
        self.role_psql(role, &sql::alter_role_sql(role))
    }

    /// One `ALTER ROLE .. SET` per attribute, in key order.
    pub fn role_attribute_updates(&self, role: &RoleTarget) -> Vec<(String, PipelineSpec)> {
        role.attributes
            .iter()
            .map(|(attr, value)| (attr.clone(), self.role_psql(role, &sql::alter_role_set_sql(&role.name, attr, value))))
            .collect()
    }

    pub fn drop_role(&self, role: &RoleTarget) -> PipelineSpec {
        let opts = PsqlOptions { database: role.database.as_deref(), ..Default::default() };
        self.psql(&role.conn, &sql::drop_role_sql(&role.name), opts)
    }

    pub fn grant(&self, role: &RoleTarget) -> Result<PipelineSpec, Error> {
        let database = role
            .database
            .as_deref()
            .ok_or_else(|| Error::InvalidArgument(format!("grant for {} needs a database", role.name)))?;
        let stmt = sql::grant_database_sql(database, &role.name, &role.privileges)?;
        Ok(self.psql(&role.conn, &stmt, PsqlOptions { database: Some(database), ..Default::default() }))
    }

    pub fn create_extension(&self, ext: &ExtensionTarget) -> PipelineSpec {
        let opts = PsqlOptions { database: Some(ext.database.as_str()), ..Default::default() };
        self.psql(&ext.conn, &sql::create_extension_sql(ext), opts)
    }

    pub fn drop_extension(&self, ext: &ExtensionTarget) -> PipelineSpec {
        let opts = PsqlOptions { database: Some(ext.database.as_str()), ..Default::default() };
        self.psql(&ext.conn, &sql::drop_extension_sql(&ext.name), opts)
    }

    /// `<dir>/<name><version>.sql` when the extension ships from source.
    pub fn extension_source_file(ext: &ExtensionTarget) -> Option<PathBuf> {
        let dir = ext.source_directory.as_deref()?;
        Some(PathBuf::from(dir).join(format!("{}{}.sql", ext.name, ext.version)))
    }

    pub fn load_extension_source(&self, ext: &ExtensionTarget) -> Option<PipelineSpec> {
        let file = Self::extension_source_file(ext)?;
        let cmd = self
            .client(&self.tools.psql, &ext.conn)
            .args(["-f".to_string(), file.to_string_lossy().into_owned()])
            .args(["-d", ext.database.as_str()])
            .args(["-U", ext.conn.user_or_default()])
            .args(["--port".to_string(), ext.conn.port_or_default().to_string()]);
        Some(cmd.into())
    }

    pub fn pending_restart(&self, conn: &ConnectionSpec, database: Option<&str>) -> PipelineSpec {
        self.psql(conn, sql::pending_restart_sql(), PsqlOptions { database, grep: None, concise: true })
    }
}
