//! Execution and planning interfaces.

use crate::cmd::PipelineSpec;
use crate::error::Error;
use crate::render::Renderer;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecResult {
    pub fn success(&self) -> bool { self.status == 0 }
}

/// The only way this crate reaches a database server.
///
/// `run_as` names the system user the pipeline runs as; `None` keeps the
/// current user. A non-zero exit is an `Ok` result; `Err` means the
/// pipeline could not be started at all.
pub trait Executor {
    fn exec(&self, pipe: &PipelineSpec, run_as: Option<&str>) -> Result<ExecResult, Error>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn exec(&self, pipe: &PipelineSpec, run_as: Option<&str>) -> Result<ExecResult, Error> {
        (**self).exec(pipe, run_as)
    }
}

/// A simple planner that renders a pipeline using the given renderer
/// and returns the planned string (no execution).
pub struct Planner<'a, R: Renderer> { pub renderer: &'a R }

impl<'a, R: Renderer> Planner<'a, R> {
    pub fn plan(&self, pipe: &PipelineSpec) -> Result<String, Error> {
        self.renderer.render_pipe_plan(pipe)
    }
}

#[cfg(feature = "exec")]
#[derive(Debug, Clone, Default)]
pub struct StdExecutor;

#[cfg(feature = "exec")]
impl Executor for StdExecutor {
    fn exec(&self, pipe: &PipelineSpec, run_as: Option<&str>) -> Result<ExecResult, Error> {
        use std::process::{Command, Stdio as PStdio};
        use crate::render::PosixRenderer;

        let r = PosixRenderer::default();
        let cmdline = r.render_pipe(pipe)?;
        let shown = if pipe.is_sensitive() { r.render_pipe_plan(pipe)? } else { cmdline.clone() };
        tracing::debug!(command = %shown, run_as = run_as.unwrap_or("-"), "executing");

        let mut command = match run_as {
            Some(user) => {
                let mut c = Command::new("su");
                c.args(["-s", "/bin/sh", user, "-c"]).arg(&cmdline);
                c
            }
            None => {
                let mut c = Command::new("sh");
                c.arg("-c").arg(&cmdline);
                c
            }
        };
        let output = command
            .stdin(PStdio::null())
            .output()
            .map_err(|e| Error::ExecError(format!("{}: {}", shown, e)))?;
        let result = ExecResult {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };
        tracing::debug!(status = result.status, "command finished");
        Ok(result)
    }
}
