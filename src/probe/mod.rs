//! Existence and state predicates deciding whether an action must run.
//!
//! Each predicate runs one fresh query through the [`Executor`]; nothing is
//! cached between calls.

use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::build::{CommandBuilder, PsqlOptions};
use crate::cmd::PipelineSpec;
use crate::conn::ConnectionSpec;
use crate::error::Error;
use crate::exec::{ExecResult, Executor};
use crate::host::{run_as_user, Filesystem};
use crate::sql;
use crate::target::{DatabaseTarget, ExtensionTarget, RoleTarget};

pub const RECOVERY_FILE: &str = "recovery.conf";

lazy_static! {
    static ref INSTALLED_LINE: Regex = Regex::new(r"(?m)^installed$").unwrap();
}

pub struct Probe<'a, E: Executor + ?Sized, F: Filesystem + ?Sized> {
    pub exec: &'a E,
    pub fs: &'a F,
    pub builder: &'a CommandBuilder,
}

impl<'a, E: Executor + ?Sized, F: Filesystem + ?Sized> Probe<'a, E, F> {
    pub fn new(exec: &'a E, fs: &'a F, builder: &'a CommandBuilder) -> Self {
        Probe { exec, fs, builder }
    }

    // Queries run as the connecting user when the host knows that account.
    fn query(&self, conn: &ConnectionSpec, pipe: &PipelineSpec) -> Result<ExecResult, Error> {
        self.exec.exec(pipe, run_as_user(self.fs, conn.user_or_default()))
    }

    /// True iff the lookup pipeline exits 0.
    ///
    /// The pipeline ends in `grep -- <name>` and only the status is
    /// consulted. Connecting with `-d <name>` makes a missing database fail
    /// before grep sees any output.
    pub fn database_exists(&self, db: &DatabaseTarget) -> Result<bool, Error> {
        let opts = PsqlOptions { database: Some(db.name.as_str()), grep: Some(db.name.as_str()), concise: false };
        let pipe = self.builder.psql(&db.conn, &sql::database_exists_sql(&db.name), opts);
        let res = self.query(&db.conn, &pipe)?;
        tracing::debug!(database = %db.name, status = res.status, "database_exists");
        Ok(res.success())
    }

    /// Exit-status check against `pg_roles`, like [`Probe::database_exists`].
    ///
    /// The query output keeps psql's header and footer, so grep also matches
    /// those: a role named after a word in them (`rows`, `rolname`) always
    /// reads as existing.
    pub fn user_exists(&self, role: &RoleTarget) -> Result<bool, Error> {
        let opts = PsqlOptions { database: role.database.as_deref(), grep: Some(role.name.as_str()), concise: false };
        let pipe = self.builder.psql(&role.conn, &sql::role_exists_sql(&role.name), opts);
        let res = self.query(&role.conn, &pipe)?;
        tracing::debug!(role = %role.name, status = res.status, "user_exists");
        Ok(res.success())
    }

    /// True only when stdout has a line that is exactly `installed`.
    pub fn extension_installed(&self, ext: &ExtensionTarget) -> Result<bool, Error> {
        let opts = PsqlOptions { database: Some(ext.database.as_str()), grep: None, concise: true };
        let pipe = self.builder.psql(&ext.conn, &sql::extension_installed_sql(&ext.name), opts);
        let res = self.query(&ext.conn, &pipe)?;
        let installed = INSTALLED_LINE.is_match(&res.stdout);
        tracing::debug!(extension = %ext.name, database = %ext.database, installed, "extension_installed");
        Ok(installed)
    }

    /// A failed query counts as "restart needed".
    pub fn needs_restart(&self, conn: &ConnectionSpec, database: Option<&str>) -> Result<bool, Error> {
        let pipe = self.builder.pending_restart(conn, database);
        let res = self.query(conn, &pipe)?;
        let pending = res.stdout.trim().parse::<i64>().unwrap_or(0);
        tracing::debug!(status = res.status, pending, "needs_restart");
        Ok(!res.success() || pending > 0)
    }

    pub fn is_replica(&self, data_dir: &str) -> bool {
        self.fs.exists(&Path::new(data_dir).join(RECOVERY_FILE))
    }

    /// Standby check for a server this host owns; remote servers never count.
    pub fn is_local_replica(&self, conn: &ConnectionSpec, data_dir: &str) -> bool {
        conn.is_local() && self.is_replica(data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fail, ok, MemFs, ScriptedExecutor};

    fn probe<'a>(e: &'a ScriptedExecutor, fs: &'a MemFs, b: &'a CommandBuilder) -> Probe<'a, ScriptedExecutor, MemFs> {
        Probe::new(e, fs, b)
    }

    #[test]
    fn database_exists_follows_exit_status() {
        let b = CommandBuilder::default();
        let fs = MemFs::new();
        let db = DatabaseTarget::new("app");

        let e = ScriptedExecutor::new().on("pg_database", ok("app\n"));
        assert!(probe(&e, &fs, &b).database_exists(&db).unwrap());
        assert_eq!(
            e.lines(),
            vec!["/usr/bin/psql -c 'SELECT datname from pg_database WHERE datname='\"'\"'app'\"'\"'' -U postgres -p 5432 -d app | grep -- app"]
        );

        let e = ScriptedExecutor::new().on("pg_database", fail(1, ""));
        assert!(!probe(&e, &fs, &b).database_exists(&db).unwrap());
    }

    // Status alone decides: output is never inspected.
    #[test]
    fn database_exists_ignores_stdout() {
        let b = CommandBuilder::default();
        let fs = MemFs::new();
        let e = ScriptedExecutor::new().on("pg_database", ok(""));
        assert!(probe(&e, &fs, &b).database_exists(&DatabaseTarget::new("app")).unwrap());
        let e = ScriptedExecutor::new().on("pg_database", ExecResult { status: 2, stdout: "app\n".into(), stderr: String::new() });
        assert!(!probe(&e, &fs, &b).database_exists(&DatabaseTarget::new("app")).unwrap());
    }

    #[test]
    fn user_exists_uses_role_database_and_run_as() {
        let b = CommandBuilder::default();
        let fs = MemFs::new().with_postgres_user();
        let mut role = RoleTarget::new("app");
        role.database = Some("appdb".into());
        let e = ScriptedExecutor::new().on("pg_roles", ok(""));
        assert!(probe(&e, &fs, &b).user_exists(&role).unwrap());
        let calls = e.calls.borrow();
        assert!(calls[0].line.contains("-d appdb | grep -- app"));
        assert_eq!(calls[0].run_as.as_deref(), Some("postgres"));
    }

    // Fake psql printing the empty result table the real one would show.
    #[cfg(all(unix, feature = "exec"))]
    #[test]
    fn user_exists_matches_psql_footer() {
        use std::os::unix::fs::PermissionsExt;
        use crate::build::ClientTools;
        use crate::exec::StdExecutor;

        let dir = tempfile::tempdir().unwrap();
        let psql = dir.path().join("psql");
        std::fs::write(&psql, "#!/bin/sh\nprintf ' rolname \\n---------\\n(0 rows)\\n\\n'\n").unwrap();
        std::fs::set_permissions(&psql, std::fs::Permissions::from_mode(0o755)).unwrap();

        let b = CommandBuilder::new(ClientTools { psql: psql.to_string_lossy().into_owned(), ..Default::default() });
        let fs = MemFs::new();
        let p = Probe::new(&StdExecutor, &fs, &b);
        assert!(!p.user_exists(&RoleTarget::new("app")).unwrap());
        assert!(p.user_exists(&RoleTarget::new("rows")).unwrap());
        assert!(p.user_exists(&RoleTarget::new("rolname")).unwrap());
    }

    #[test]
    fn unknown_system_user_runs_as_current() {
        let b = CommandBuilder::default();
        let fs = MemFs::new().with_postgres_user();
        let mut role = RoleTarget::new("app");
        role.conn.user = Some("deploy".into());
        let e = ScriptedExecutor::new().on("pg_roles", fail(1, ""));
        assert!(!probe(&e, &fs, &b).user_exists(&role).unwrap());
        assert_eq!(e.calls.borrow()[0].run_as, None);
    }

    #[test]
    fn extension_installed_needs_exact_line() {
        let b = CommandBuilder::default();
        let fs = MemFs::new();
        let ext = ExtensionTarget::new("pgcrypto", "app");
        for (stdout, want) in [
            ("installed\n", true),
            ("installed", true),
            ("notice\ninstalled\n", true),
            ("", false),
            ("not installed\n", false),
            ("installed already\n", false),
            ("0\n", false),
        ] {
            let e = ScriptedExecutor::new().on("pg_extension", ok(stdout));
            assert_eq!(probe(&e, &fs, &b).extension_installed(&ext).unwrap(), want, "{:?}", stdout);
        }
    }

    #[test]
    fn extension_installed_ignores_status() {
        let b = CommandBuilder::default();
        let fs = MemFs::new();
        let ext = ExtensionTarget::new("pgcrypto", "app");
        let e = ScriptedExecutor::new().on("pg_extension", fail(2, "connection refused"));
        assert!(!probe(&e, &fs, &b).extension_installed(&ext).unwrap());
        assert!(e.lines()[0].contains("-At -c"));
    }

    #[test]
    fn needs_restart_cases() {
        let b = CommandBuilder::default();
        let fs = MemFs::new();
        let conn = ConnectionSpec::default();
        for (result, want) in [(ok("0\n"), false), (ok("2\n"), true), (fail(2, ""), true), (ok(""), false), (ok("junk"), false)] {
            let e = ScriptedExecutor::new().on("pg_settings", result.clone());
            assert_eq!(probe(&e, &fs, &b).needs_restart(&conn, None).unwrap(), want, "{:?}", result);
        }
    }

    #[test]
    fn spawn_failure_propagates() {
        let b = CommandBuilder::default();
        let fs = MemFs::new();
        let e = ScriptedExecutor::refusing();
        assert!(matches!(probe(&e, &fs, &b).database_exists(&DatabaseTarget::new("app")), Err(Error::ExecError(_))));
        assert!(probe(&e, &fs, &b).needs_restart(&ConnectionSpec::default(), None).is_err());
    }

    #[test]
    fn replica_is_marker_file() {
        let b = CommandBuilder::default();
        let e = ScriptedExecutor::new();
        let fs = MemFs::new().with_file("/var/lib/pgsql/9.6/data/recovery.conf", "standby_mode = on");
        let p = probe(&e, &fs, &b);
        assert!(p.is_replica("/var/lib/pgsql/9.6/data"));
        assert!(!p.is_replica("/var/lib/postgresql/9.6/main"));

        let remote = ConnectionSpec { host: Some("db.example.com".into()), ..Default::default() };
        assert!(p.is_local_replica(&ConnectionSpec::default(), "/var/lib/pgsql/9.6/data"));
        assert!(!p.is_local_replica(&remote, "/var/lib/pgsql/9.6/data"));
        assert!(e.calls.borrow().is_empty());
    }
}
