//! Connection resolution: local socket vs TCP, peer vs password.

mod password;

pub use password::{generate_password, resolve_password};

use serde::{Deserialize, Serialize};

use crate::cmd::CommandSpec;

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_USER: &str = "postgres";
pub const LOCAL_HOSTS: [&str; 2] = ["localhost", "127.0.0.1"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionSpec {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub password_generate: bool,
    pub peer: bool,
}

impl ConnectionSpec {
    pub fn user_or_default(&self) -> &str { self.user.as_deref().unwrap_or(DEFAULT_USER) }

    pub fn port_or_default(&self) -> u16 { self.port.unwrap_or(DEFAULT_PORT) }

    pub fn host_or_default(&self) -> &str { self.host.as_deref().unwrap_or("localhost") }

    pub fn is_local(&self) -> bool {
        match self.host.as_deref() {
            None => true,
            Some(h) => LOCAL_HOSTS.contains(&h),
        }
    }

    /// Whether the client must be pointed at a host over TCP.
    ///
    /// Peer authentication always stays on the socket. Otherwise this is
    /// true only for a remote host combined with the default `postgres`
    /// user. A remote host with a named user stays on the socket, which
    /// looks inverted but is the established behaviour.
    pub fn uses_tcp(&self) -> bool {
        if self.peer { return false; }
        !self.is_local() && matches!(self.user.as_deref(), None | Some(DEFAULT_USER))
    }

    pub fn uses_password(&self) -> bool { self.password.is_some() && self.uses_tcp() }

    /// A copy carrying `password` as the configured password.
    pub fn with_password(&self, password: impl Into<String>) -> Self {
        ConnectionSpec { password: Some(password.into()), password_generate: false, ..self.clone() }
    }

    /// The connection with its password fixed for one action.
    ///
    /// A `password_generate` connection gets a fresh value here, so every
    /// command built from the returned copy shares it.
    pub fn effective(&self) -> Self {
        match (self.password_generate, resolve_password(self)) {
            (true, Some(p)) => self.with_password(p),
            _ => self.clone(),
        }
    }
}

/// Command prefix for `executable` with host and password applied.
pub fn build_client_invocation(executable: &str, spec: &ConnectionSpec) -> CommandSpec {
    let cmd = CommandSpec::new(executable);
    if !spec.uses_tcp() {
        return cmd;
    }
    let cmd = match (&spec.password, spec.uses_password()) {
        (Some(p), true) => cmd.env("PGPASSWORD", p.as_str()).sensitive(true),
        _ => cmd,
    };
    cmd.args(["-h", spec.host_or_default()])
}
