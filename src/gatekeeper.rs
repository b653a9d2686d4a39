//! Device access gatekeeper
//!
//! Every device node the pipeline touches is opened and closed through a
//! [`Gatekeeper`]. Unprivileged code never calls open(2) on /dev nodes itself;
//! the gatekeeper is the privilege-separation boundary (direct open when we
//! already hold the rights, libseat otherwise).

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, trace, warn};

use crate::error::AccessError;

/// Kind of device node being opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCategory {
    Input,
    Drm,
}

/// Bookkeeping for one open descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceToken {
    pub path: PathBuf,
    pub flags: i32,
    pub category: DeviceCategory,
}

/// Privileged open/close of device nodes
pub trait Gatekeeper {
    /// Open `path`. The returned fd stays registered until passed to `close`.
    fn open(&mut self, path: &Path, flags: i32, category: DeviceCategory) -> Result<OwnedFd, AccessError>;

    /// Release a descriptor previously returned by `open`
    fn close(&mut self, fd: OwnedFd);

    /// Number of descriptors currently handed out
    fn open_count(&self) -> usize;
}

/// Gatekeeper shared between the backend adapter and its owner
pub type SharedGatekeeper = Rc<RefCell<dyn Gatekeeper>>;

/// Table of live tokens, keyed by raw fd
#[derive(Debug, Default)]
pub struct TokenTable {
    tokens: HashMap<RawFd, DeviceToken>,
}

impl TokenTable {
    pub fn insert(&mut self, fd: RawFd, token: DeviceToken) {
        if let Some(stale) = self.tokens.insert(fd, token) {
            warn!("gatekeeper: fd {} reused while still tracked ({})", fd, stale.path.display());
        }
    }

    pub fn remove(&mut self, fd: RawFd) -> Option<DeviceToken> {
        self.tokens.remove(&fd)
    }

    pub fn get(&self, fd: RawFd) -> Option<&DeviceToken> {
        self.tokens.get(&fd)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Opens nodes with the process's own credentials (root or ACL'd user)
#[derive(Debug, Default)]
pub struct DirectGatekeeper {
    tokens: TokenTable,
}

impl DirectGatekeeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedGatekeeper {
        Rc::new(RefCell::new(self))
    }
}

impl Gatekeeper for DirectGatekeeper {
    fn open(&mut self, path: &Path, flags: i32, category: DeviceCategory) -> Result<OwnedFd, AccessError> {
        let access = flags & libc::O_ACCMODE;
        let file = OpenOptions::new()
            .read(access == libc::O_RDONLY || access == libc::O_RDWR)
            .write(access == libc::O_WRONLY || access == libc::O_RDWR)
            .custom_flags(flags & !libc::O_ACCMODE)
            .open(path)
            .map_err(|e| {
                warn!("Cannot open device: {:?}: {}", path, e);
                AccessError::from_io(path, e)
            })?;

        let fd = OwnedFd::from(file);
        debug!("gatekeeper: opened {} ({:?}, fd={})", path.display(), category, fd.as_raw_fd());
        self.tokens.insert(
            fd.as_raw_fd(),
            DeviceToken {
                path: path.to_path_buf(),
                flags,
                category,
            },
        );
        Ok(fd)
    }

    fn close(&mut self, fd: OwnedFd) {
        match self.tokens.remove(fd.as_raw_fd()) {
            Some(token) => trace!("gatekeeper: closed {}", token.path.display()),
            None => warn!("gatekeeper: closing untracked fd {}", fd.as_raw_fd()),
        }
        drop(fd);
    }

    fn open_count(&self) -> usize {
        self.tokens.len()
    }
}

impl Drop for DirectGatekeeper {
    fn drop(&mut self) {
        if !self.tokens.is_empty() {
            warn!("gatekeeper: dropped with {} device(s) still open", self.tokens.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_open_close_tracks_tokens() {
        let mut gk = DirectGatekeeper::new();
        let fd = gk
            .open(Path::new("/dev/null"), libc::O_RDONLY | libc::O_NONBLOCK, DeviceCategory::Input)
            .unwrap();
        assert_eq!(gk.open_count(), 1);
        let token = gk.tokens.get(fd.as_raw_fd()).cloned().unwrap();
        assert_eq!(token.path, PathBuf::from("/dev/null"));
        assert_eq!(token.category, DeviceCategory::Input);

        gk.close(fd);
        assert_eq!(gk.open_count(), 0);
        assert!(gk.tokens.is_empty());
    }

    #[test]
    fn test_direct_open_read_write() {
        let mut gk = DirectGatekeeper::new();
        let fd = gk
            .open(Path::new("/dev/null"), libc::O_RDWR, DeviceCategory::Drm)
            .unwrap();
        assert_eq!(gk.tokens.get(fd.as_raw_fd()).map(|t| t.category), Some(DeviceCategory::Drm));
        gk.close(fd);
    }

    #[test]
    fn test_direct_open_missing_node_is_io_error() {
        let mut gk = DirectGatekeeper::new();
        let err = gk
            .open(Path::new("/dev/input/does-not-exist"), libc::O_RDONLY, DeviceCategory::Input)
            .unwrap_err();
        assert!(matches!(err, AccessError::Io { .. }));
        assert_eq!(gk.open_count(), 0);
    }
}
