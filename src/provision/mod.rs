//! Check-then-act provisioning actions.
//!
//! Every mutating command runs only after its predicate says it is still
//! needed and the local server is not a standby. Nothing is retried; a
//! failing command aborts with [`Error::CommandFailed`].

use std::fmt;
use std::path::{Path, PathBuf};

use crate::build::CommandBuilder;
use crate::cmd::PipelineSpec;
use crate::conn::{ConnectionSpec, DEFAULT_USER};
use crate::error::Error;
use crate::exec::{Executor, Planner};
use crate::host::{run_as_user, Filesystem};
use crate::platform::PlatformContext;
use crate::probe::Probe;
use crate::render::PosixRenderer;
use crate::server::ServerConf;
use crate::target::{DatabaseTarget, ExtensionTarget, RoleTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Replica,
    AlreadyPresent,
    Absent,
    NothingToGrant,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Replica => "server is a replica",
            SkipReason::AlreadyPresent => "already present",
            SkipReason::Absent => "not present",
            SkipReason::NothingToGrant => "no database or privileges to grant",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Dry run: the rendered commands that would have run.
    Planned(Vec<String>),
    Skipped(SkipReason),
}

pub struct Provisioner<E: Executor, F: Filesystem> {
    pub platform: PlatformContext,
    pub builder: CommandBuilder,
    pub exec: E,
    pub fs: F,
    pub dry_run: bool,
    data_dir: String,
    renderer: PosixRenderer,
}

impl<E: Executor, F: Filesystem> Provisioner<E, F> {
    pub fn new(platform: PlatformContext, builder: CommandBuilder, exec: E, fs: F) -> Self {
        let data_dir = platform.data_dir();
        Provisioner { platform, builder, exec, fs, dry_run: false, data_dir, renderer: PosixRenderer::loose() }
    }

    pub fn dry_run(mut self, yes: bool) -> Self { self.dry_run = yes; self }

    /// Data directory checked for the standby marker; the platform default
    /// unless overridden.
    pub fn data_directory(mut self, dir: impl Into<String>) -> Self { self.data_dir = dir.into(); self }

    pub fn data_dir(&self) -> &str { &self.data_dir }

    pub fn is_replica(&self) -> bool { self.probe().is_replica(&self.data_dir) }

    pub fn probe(&self) -> Probe<'_, E, F> { Probe::new(&self.exec, &self.fs, &self.builder) }

    fn replica_guard(&self, conn: &ConnectionSpec) -> bool {
        self.probe().is_local_replica(conn, &self.data_dir)
    }

    fn run_as(&self) -> Option<&'static str> { run_as_user(&self.fs, DEFAULT_USER) }

    /// Run (or plan) `steps` in order, stopping at the first failure.
    fn apply(&self, steps: Vec<(String, PipelineSpec)>) -> Result<Outcome, Error> {
        if self.dry_run {
            let planner = Planner { renderer: &self.renderer };
            let mut planned = Vec::with_capacity(steps.len());
            for (_, pipe) in &steps { planned.push(planner.plan(pipe)?); }
            return Ok(Outcome::Planned(planned));
        }
        let run_as = self.run_as();
        for (description, pipe) in steps {
            let res = self.exec.exec(&pipe, run_as)?;
            if !res.success() {
                return Err(Error::CommandFailed { description, status: res.status, stderr: res.stderr.trim().to_string() });
            }
            tracing::info!("{}", description);
        }
        Ok(Outcome::Applied)
    }

    pub fn create_database(&self, db: &DatabaseTarget) -> Result<Outcome, Error> {
        let db = &db.resolved();
        if self.replica_guard(&db.conn) { return Ok(Outcome::Skipped(SkipReason::Replica)); }
        if self.probe().database_exists(db)? { return Ok(Outcome::Skipped(SkipReason::AlreadyPresent)); }
        self.apply(vec![(format!("create database {}", db.name), self.builder.create_database(db))])
    }

    pub fn drop_database(&self, db: &DatabaseTarget) -> Result<Outcome, Error> {
        let db = &db.resolved();
        if self.replica_guard(&db.conn) { return Ok(Outcome::Skipped(SkipReason::Replica)); }
        if !self.probe().database_exists(db)? { return Ok(Outcome::Skipped(SkipReason::Absent)); }
        self.apply(vec![(format!("drop database {}", db.name), self.builder.drop_database(db))])
    }

    pub fn create_role(&self, role: &RoleTarget) -> Result<Outcome, Error> {
        let role = &role.resolved();
        if !role.attributes.is_empty() {
            tracing::warn!(role = %role.name, "attributes are ignored by create; use update");
        }
        if self.replica_guard(&role.conn) { return Ok(Outcome::Skipped(SkipReason::Replica)); }
        if self.probe().user_exists(role)? { return Ok(Outcome::Skipped(SkipReason::AlreadyPresent)); }
        self.apply(vec![(format!("create role {}", role.name), self.builder.create_role(role))])
    }

    /// Rewrites the role clause, or sets each attribute when any are given.
    pub fn update_role(&self, role: &RoleTarget) -> Result<Outcome, Error> {
        let role = &role.resolved();
        if self.replica_guard(&role.conn) { return Ok(Outcome::Skipped(SkipReason::Replica)); }
        if !self.probe().user_exists(role)? { return Ok(Outcome::Skipped(SkipReason::Absent)); }
        let steps = if role.attributes.is_empty() {
            vec![(format!("update role {}", role.name), self.builder.update_role(role))]
        } else {
            self.builder
                .role_attribute_updates(role)
                .into_iter()
                .map(|(attr, pipe)| (format!("set {} for role {}", attr, role.name), pipe))
                .collect()
        };
        self.apply(steps)
    }

    pub fn drop_role(&self, role: &RoleTarget) -> Result<Outcome, Error> {
        let role = &role.resolved();
        if self.replica_guard(&role.conn) { return Ok(Outcome::Skipped(SkipReason::Replica)); }
        if !self.probe().user_exists(role)? { return Ok(Outcome::Skipped(SkipReason::Absent)); }
        self.apply(vec![(format!("drop role {}", role.name), self.builder.drop_role(role))])
    }

    pub fn grant_role(&self, role: &RoleTarget) -> Result<Outcome, Error> {
        let database = match (&role.database, role.privileges.is_empty()) {
            (Some(db), false) => db,
            _ => return Ok(Outcome::Skipped(SkipReason::NothingToGrant)),
        };
        if self.replica_guard(&role.conn) { return Ok(Outcome::Skipped(SkipReason::Replica)); }
        let role = &role.resolved();
        let pipe = self.builder.grant(role)?;
        let db = DatabaseTarget { conn: role.conn.clone(), ..DatabaseTarget::new(database.as_str()) };
        let probe = self.probe();
        if !(probe.user_exists(role)? && probe.database_exists(&db)?) {
            return Ok(Outcome::Skipped(SkipReason::Absent));
        }
        self.apply(vec![(format!("grant {} access to {}", role.name, database), pipe)])
    }

    fn control_file_link(&self, ext: &ExtensionTarget) -> Option<(PathBuf, PathBuf)> {
        let dir = ext.source_directory.as_deref()?;
        let file = format!("{}.control", ext.name);
        Some((Path::new(dir).join(&file), Path::new(&self.platform.extension_dir()).join(&file)))
    }

    /// Loads the extension script from `source_directory` first when set.
    pub fn create_extension(&self, ext: &ExtensionTarget) -> Result<Outcome, Error> {
        let ext = &ext.resolved();
        if self.replica_guard(&ext.conn) { return Ok(Outcome::Skipped(SkipReason::Replica)); }
        if self.probe().extension_installed(ext)? { return Ok(Outcome::Skipped(SkipReason::AlreadyPresent)); }
        let mut steps = Vec::new();
        if let Some(load) = self.builder.load_extension_source(ext) {
            steps.push((format!("load extension {} from source", ext.name), load));
        }
        steps.push((format!("create extension {}", ext.name), self.builder.create_extension(ext)));
        let outcome = self.apply(steps)?;
        if let (Outcome::Applied, Some((target, link))) = (&outcome, self.control_file_link(ext)) {
            self.fs.symlink(&target, &link)?;
            tracing::info!(link = %link.display(), "linked control file for {}", ext.name);
        }
        Ok(outcome)
    }

    pub fn drop_extension(&self, ext: &ExtensionTarget) -> Result<Outcome, Error> {
        let ext = &ext.resolved();
        if self.replica_guard(&ext.conn) { return Ok(Outcome::Skipped(SkipReason::Replica)); }
        if !self.probe().extension_installed(ext)? { return Ok(Outcome::Skipped(SkipReason::Absent)); }
        self.apply(vec![(format!("drop extension {}", ext.name), self.builder.drop_extension(ext))])
    }

    /// Reports whether settings are waiting on a restart; never restarts.
    pub fn check_restart(&self, conf: &ServerConf) -> Result<bool, Error> {
        let pending = self.probe().needs_restart(&conf.conn.effective(), conf.database.as_deref())?;
        if pending {
            tracing::warn!(service = %self.platform.with_version(conf.version.as_str()).service_name(), "restart pending");
        }
        Ok(pending)
    }
}
