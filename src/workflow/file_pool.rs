/// Read-only pool of files uploaded with budget requests.
use crate::error::{AppError, RoundError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Directory of candidate upload files.
///
/// Cloning is cheap; clones share the entry list and the lease counter.
#[derive(Debug, Clone)]
pub struct FilePool {
    root: PathBuf,
    entries: Arc<[String]>,
    open_leases: Arc<AtomicUsize>,
}

impl FilePool {
    /// Scan `root` for regular files, following symlinks. Missing or empty
    /// directories are configuration errors.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, AppError> {
        let root = root.as_ref();
        let dir = std::fs::read_dir(root).map_err(|e| {
            AppError::Config(format!("File pool {} is unavailable: {}", root.display(), e))
        })?;

        let mut entries = Vec::new();
        for entry in dir {
            let entry = entry?;
            if entry.path().is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    entries.push(name.to_string());
                }
            }
        }
        entries.sort();

        Self::from_entries(root, entries)
    }

    /// Build a pool from known entry names without scanning.
    pub fn from_entries(root: impl Into<PathBuf>, entries: Vec<String>) -> Result<Self, AppError> {
        let root = root.into();
        if entries.is_empty() {
            return Err(AppError::Config(format!(
                "File pool {} contains no files",
                root.display()
            )));
        }
        Ok(Self {
            root,
            entries: entries.into(),
            open_leases: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Uniformly pick an entry name.
    pub fn pick(&self, rng: &mut fastrand::Rng) -> &str {
        &self.entries[rng.usize(..self.entries.len())]
    }

    /// Open `name` and read it fully. The handle stays open until the lease
    /// is dropped.
    pub async fn lease(&self, name: &str) -> Result<FileLease, RoundError> {
        let path = self.root.join(name);
        let unavailable = |e: std::io::Error| RoundError::ResourceUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        };

        let mut file = tokio::fs::File::open(&path).await.map_err(unavailable)?;
        // Counted before the read so a failed read still releases through Drop.
        let guard = LeaseGuard::acquire(self.open_leases.clone());
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).await.map_err(unavailable)?;

        Ok(FileLease {
            name: name.to_string(),
            bytes,
            _file: file,
            _guard: guard,
        })
    }

    /// Number of leases currently held.
    pub fn open_leases(&self) -> usize {
        self.open_leases.load(Ordering::SeqCst)
    }
}

struct LeaseGuard(Arc<AtomicUsize>);

impl LeaseGuard {
    fn acquire(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An open pool entry and its contents.
pub struct FileLease {
    name: String,
    bytes: Vec<u8>,
    _file: tokio::fs::File,
    _guard: LeaseGuard,
}

impl FileLease {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for FileLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLease")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
