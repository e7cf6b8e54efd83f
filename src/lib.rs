//! pgconverge: idempotent PostgreSQL provisioning through the client tools.

pub mod error;
pub mod cmd;
pub mod render;
pub mod exec;
pub mod host;
pub mod conn;
pub mod target;
pub mod sql;
pub mod build;
pub mod probe;
pub mod platform;
pub mod server;
pub mod provision;
pub mod config;
pub mod prelude;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
