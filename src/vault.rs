// ABOUTME: Vault abstraction over `/`-separated, vault-relative paths
// ABOUTME: Directory-backed and in-memory implementations

use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// File operations the synchronizer needs from a note vault.
///
/// Paths are relative to the vault root and already cleaned (see
/// [`crate::util::clean_path`]). `mkdir` creates missing parents.
#[allow(async_fn_in_trait)]
pub trait Vault {
    async fn exists(&self, path: &str) -> Result<bool>;

    async fn mkdir(&self, path: &str) -> Result<()>;

    async fn read(&self, path: &str) -> Result<String>;

    async fn write(&self, path: &str, content: &str) -> Result<()>;
}

pub struct FsVault {
    root: PathBuf,
}

impl FsVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsVault { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(Error::Filesystem(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("path escapes the vault: {}", path),
                    )))
                }
            }
        }
        Ok(resolved)
    }
}

impl Vault for FsVault {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)?).await?)
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.resolve(path)?).await?;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<String> {
        Ok(tokio::fs::read_to_string(self.resolve(path)?).await?)
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        use rand::Rng;

        let target = self.resolve(path)?;
        let dir = target.parent().unwrap_or(&self.root);
        let random: u32 = rand::thread_rng().gen();
        let tmp_path = dir.join(format!(".{:x}.part", random));

        tokio::fs::write(&tmp_path, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// A vault operation as recorded by [`MemoryVault`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultOp {
    Exists(String),
    Mkdir(String),
    Read(String),
    Write(String),
}

/// Vault kept entirely in memory, recording every call in order.
#[derive(Default)]
pub struct MemoryVault {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, String>,
    folders: BTreeSet<String>,
    ops: Vec<VaultOp>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.lock().files.insert(path.to_string(), content.to_string());
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn files(&self) -> BTreeMap<String, String> {
        self.lock().files.clone()
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    pub fn ops(&self) -> Vec<VaultOp> {
        self.lock().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.lock().ops.clear();
    }
}

impl Vault for MemoryVault {
    async fn exists(&self, path: &str) -> Result<bool> {
        let mut state = self.lock();
        state.ops.push(VaultOp::Exists(path.to_string()));
        Ok(state.files.contains_key(path) || state.folders.contains(path))
    }

    async fn mkdir(&self, path: &str) -> Result<()> {
        let mut state = self.lock();
        state.ops.push(VaultOp::Mkdir(path.to_string()));
        let mut current = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(segment);
            state.folders.insert(current.clone());
        }
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<String> {
        let mut state = self.lock();
        state.ops.push(VaultOp::Read(path.to_string()));
        state.files.get(path).cloned().ok_or_else(|| {
            Error::Filesystem(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file in vault: {}", path),
            ))
        })
    }

    async fn write(&self, path: &str, content: &str) -> Result<()> {
        let mut state = self.lock();
        state.ops.push(VaultOp::Write(path.to_string()));
        state.files.insert(path.to_string(), content.to_string());
        Ok(())
    }
}
