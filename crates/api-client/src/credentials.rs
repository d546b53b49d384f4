use crate::error::CredentialError;
use core_types::Credential;
use parking_lot::RwLock;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Process-wide holder of the current credential pair.
///
/// Cloning is cheap and every clone sees the same pair. The pair is always swapped
/// as a whole, and when the store is file-backed every change is written through to disk.
#[derive(Clone, Default)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    current: RwLock<Option<Credential>>,
    path: Option<PathBuf>,
}

impl CredentialStore {
    /// A store that only lives as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Opens a file-backed store, loading any pair saved by a previous run.
    ///
    /// A missing file yields an empty store. An unreadable JSON body is logged and ignored.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CredentialError> {
        let path = path.into();
        let current = load(&path)?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                current: RwLock::new(current),
                path: Some(path),
            }),
        })
    }

    pub fn get(&self) -> Option<Credential> {
        self.inner.current.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner
            .current
            .read()
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .current
            .read()
            .as_ref()
            .map(|c| c.refresh_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.current.read().is_some()
    }

    /// Replaces the pair. The in-memory value is updated even if persisting fails.
    pub fn set(&self, credential: Credential) -> Result<(), CredentialError> {
        *self.inner.current.write() = Some(credential.clone());
        match &self.inner.path {
            Some(path) => save(path, &credential),
            None => Ok(()),
        }
    }

    /// Forgets the pair and deletes the credentials file.
    pub fn clear(&self) -> Result<(), CredentialError> {
        *self.inner.current.write() = None;
        match &self.inner.path {
            Some(path) => remove(path),
            None => Ok(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }
}

fn load(path: &Path) -> Result<Option<Credential>, CredentialError> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str::<Credential>(&data) {
        Ok(credential) => Ok(Some(credential)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable credentials file.");
            Ok(None)
        }
    }
}

fn save(path: &Path, credential: &Credential) -> Result<(), CredentialError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(credential)?;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        // Only applies when the file is created.
        options.mode(0o600);
    }
    let mut file = options.open(path)?;

    #[cfg(unix)]
    {
        // A file left by an older run may still be group or world readable.
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(json.as_bytes())?;
    Ok(())
}

fn remove(path: &Path) -> Result<(), CredentialError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
