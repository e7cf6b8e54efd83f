//! Filesystem boundary and local system lookups.

use std::path::Path;

use crate::error::Error;

pub const PASSWD_FILE: &str = "/etc/passwd";

pub trait Filesystem {
    fn exists(&self, path: &Path) -> bool;
    fn read_to_string(&self, path: &Path) -> Result<String, Error>;
    /// Create `link` pointing at `target`. An existing link is replaced.
    fn symlink(&self, target: &Path, link: &Path) -> Result<(), Error>;
    /// Effective uid of this process, when the host can tell.
    fn effective_uid(&self) -> Option<u32>;
}

impl<F: Filesystem + ?Sized> Filesystem for &F {
    fn exists(&self, path: &Path) -> bool { (**self).exists(path) }
    fn read_to_string(&self, path: &Path) -> Result<String, Error> { (**self).read_to_string(path) }
    fn symlink(&self, target: &Path, link: &Path) -> Result<(), Error> { (**self).symlink(target, link) }
    fn effective_uid(&self) -> Option<u32> { (**self).effective_uid() }
}

#[derive(Debug, Clone, Default)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn exists(&self, path: &Path) -> bool { path.exists() }

    fn read_to_string(&self, path: &Path) -> Result<String, Error> {
        Ok(std::fs::read_to_string(path)?)
    }

    #[cfg(unix)]
    fn symlink(&self, target: &Path, link: &Path) -> Result<(), Error> {
        if let Ok(current) = std::fs::read_link(link) {
            if current == target { return Ok(()); }
            std::fs::remove_file(link)?;
        }
        std::os::unix::fs::symlink(target, link)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn symlink(&self, _target: &Path, link: &Path) -> Result<(), Error> {
        Err(Error::ExecError(format!("symlinks unsupported on this platform: {}", link.display())))
    }

    #[cfg(unix)]
    fn effective_uid(&self) -> Option<u32> {
        // SAFETY: geteuid has no preconditions and cannot fail.
        Some(unsafe { libc::geteuid() })
    }

    #[cfg(not(unix))]
    fn effective_uid(&self) -> Option<u32> { None }
}

/// True if `user` has an entry in the system password database.
pub fn system_user_exists<F: Filesystem + ?Sized>(fs: &F, user: &str) -> bool {
    match fs.read_to_string(Path::new(PASSWD_FILE)) {
        Ok(passwd) => passwd
            .lines()
            .filter(|l| !l.starts_with('#'))
            .any(|l| l.split(':').next() == Some(user)),
        Err(e) => {
            tracing::debug!(error = %e, "cannot read {}", PASSWD_FILE);
            false
        }
    }
}

/// The user to switch to before running as `user`, if any.
///
/// Only root can switch without a password, so a non-root process keeps its
/// own identity. That covers running as `user` already, e.g. under
/// `sudo -u postgres`. When the uid is unknown the switch is attempted.
pub fn run_as_user<'u, F: Filesystem + ?Sized>(fs: &F, user: &'u str) -> Option<&'u str> {
    if !system_user_exists(fs, user) {
        return None;
    }
    match fs.effective_uid() {
        None | Some(0) => Some(user),
        Some(uid) => {
            tracing::debug!(uid, user, "not root, running as the current user");
            None
        }
    }
}
