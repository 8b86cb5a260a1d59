//! Service image loading.
//!
//! `START` names a service image by a relative path. Names are sanitized
//! before any lookup: absolute paths and parent-directory components are
//! rejected outright so a guest cannot reach outside the service root.

use std::collections::HashMap;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use coproc_abi::{CoprocError, CoprocResult};
use log::{debug, trace};
use parking_lot::RwLock;

/// Resolves service names to image bytes.
pub trait ImageLoader: Send + Sync {
    fn load(&self, name: &str) -> CoprocResult<Arc<[u8]>>;
}

/// Validates a service name and returns it as a relative path.
pub fn sanitize(name: &str) -> CoprocResult<PathBuf> {
    if name.is_empty() {
        return Err(CoprocError::PathInvalid(name.to_owned()));
    }
    let path = Path::new(name);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(CoprocError::PathInvalid(name.to_owned()));
            }
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(CoprocError::PathInvalid(name.to_owned()));
    }
    Ok(clean)
}

/// Loads images from files below a root directory.
#[derive(Clone, Debug)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ImageLoader for FsLoader {
    fn load(&self, name: &str) -> CoprocResult<Arc<[u8]>> {
        let path = self.root.join(sanitize(name)?);
        trace!("loading service image {}", path.display());
        match std::fs::read(&path) {
            Ok(bytes) => {
                debug!("loaded {} ({} bytes)", path.display(), bytes.len());
                Ok(bytes.into())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(CoprocError::NotFound(name.to_owned()))
            }
            Err(err) => Err(CoprocError::load_failed(format!("{}: {err}", path.display()))),
        }
    }
}

/// In-memory image table, keyed by sanitized name.
#[derive(Default)]
pub struct MemoryLoader {
    images: RwLock<HashMap<PathBuf, Arc<[u8]>>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` under `name`, replacing any previous image.
    pub fn insert(&self, name: &str, bytes: impl Into<Arc<[u8]>>) -> CoprocResult<()> {
        let key = sanitize(name)?;
        self.images.write().insert(key, bytes.into());
        Ok(())
    }

    pub fn with_image(self, name: &str, bytes: impl Into<Arc<[u8]>>) -> CoprocResult<Self> {
        self.insert(name, bytes)?;
        Ok(self)
    }

    pub fn remove(&self, name: &str) -> bool {
        sanitize(name)
            .map(|key| self.images.write().remove(&key).is_some())
            .unwrap_or(false)
    }
}

impl ImageLoader for MemoryLoader {
    fn load(&self, name: &str) -> CoprocResult<Arc<[u8]>> {
        let key = sanitize(name)?;
        self.images
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| CoprocError::NotFound(name.to_owned()))
    }
}

impl<L: ImageLoader + ?Sized> ImageLoader for Arc<L> {
    fn load(&self, name: &str) -> CoprocResult<Arc<[u8]>> {
        (**self).load(name)
    }
}
