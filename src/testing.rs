//! Scripted executor and in-memory filesystem for unit tests.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cmd::PipelineSpec;
use crate::error::Error;
use crate::exec::{ExecResult, Executor};
use crate::host::Filesystem;
use crate::render::{PosixRenderer, Renderer};

pub(crate) fn ok(stdout: &str) -> ExecResult {
    ExecResult { status: 0, stdout: stdout.into(), stderr: String::new() }
}

pub(crate) fn fail(status: i32, stderr: &str) -> ExecResult {
    ExecResult { status, stdout: String::new(), stderr: stderr.into() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub line: String,
    pub run_as: Option<String>,
}

/// Answers with the first rule whose needle occurs in the rendered
/// command line; unmatched commands succeed with empty output.
#[derive(Default)]
pub(crate) struct ScriptedExecutor {
    rules: Vec<(String, ExecResult)>,
    refuse: bool,
    pub calls: RefCell<Vec<Call>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self { Self::default() }

    pub fn on(mut self, needle: &str, result: ExecResult) -> Self {
        self.rules.push((needle.into(), result));
        self
    }

    /// Every exec fails to spawn.
    pub fn refusing() -> Self { ScriptedExecutor { refuse: true, ..Default::default() } }

    pub fn lines(&self) -> Vec<String> { self.calls.borrow().iter().map(|c| c.line.clone()).collect() }

    pub fn ran(&self, needle: &str) -> bool { self.calls.borrow().iter().any(|c| c.line.contains(needle)) }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, pipe: &PipelineSpec, run_as: Option<&str>) -> Result<ExecResult, Error> {
        if self.refuse {
            return Err(Error::ExecError("spawn refused".into()));
        }
        let line = PosixRenderer::loose().render_pipe(pipe)?;
        let result = self
            .rules
            .iter()
            .find(|(needle, _)| line.contains(needle.as_str()))
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| ok(""));
        self.calls.borrow_mut().push(Call { line, run_as: run_as.map(Into::into) });
        Ok(result)
    }
}

#[derive(Default)]
pub(crate) struct MemFs {
    files: RefCell<BTreeMap<PathBuf, String>>,
    pub links: RefCell<Vec<(PathBuf, PathBuf)>>,
    uid: Option<u32>,
}

impl MemFs {
    pub fn new() -> Self { Self::default() }

    pub fn with_file(self, path: impl AsRef<Path>, contents: &str) -> Self {
        self.files.borrow_mut().insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    pub fn with_uid(mut self, uid: u32) -> Self { self.uid = Some(uid); self }

    pub fn with_postgres_user(self) -> Self {
        self.with_file(crate::host::PASSWD_FILE, "root:x:0:0::/root:/bin/sh\npostgres:x:26:26::/var/lib/pgsql:/bin/sh\n")
    }
}

impl Filesystem for MemFs {
    fn exists(&self, path: &Path) -> bool { self.files.borrow().contains_key(path) }

    fn read_to_string(&self, path: &Path) -> Result<String, Error> {
        self.files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, path.display().to_string())))
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<(), Error> {
        self.links.borrow_mut().push((target.to_path_buf(), link.to_path_buf()));
        Ok(())
    }

    fn effective_uid(&self) -> Option<u32> { self.uid }
}
