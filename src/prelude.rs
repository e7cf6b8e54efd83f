//! pgconverge::prelude - the types a provisioning run touches

pub use crate::error::{Error, Result};
pub use crate::build::{ClientTools, CommandBuilder, PsqlOptions};
pub use crate::config::Manifest;
pub use crate::conn::{build_client_invocation, generate_password, resolve_password, ConnectionSpec};
pub use crate::exec::{ExecResult, Executor, Planner};
pub use crate::host::{Filesystem, OsFilesystem};
pub use crate::platform::{PlatformContext, PlatformFamily};
pub use crate::probe::Probe;
pub use crate::provision::{Outcome, Provisioner, SkipReason};
pub use crate::server::{ServerConf, ServerSettings};
pub use crate::target::{DatabaseTarget, ExtensionTarget, RoleFlags, RoleTarget};

#[cfg(feature = "exec")]
pub use crate::exec::StdExecutor;
