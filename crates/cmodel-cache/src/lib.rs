//! Content-addressed plugin cache.
//!
//! Compiled artifacts are partitioned by the resolver's manifest hash:
//! `{root}/{base64url(hash)}/{name}-{version}.so`. A sentinel file inside
//! the partition carries an advisory file lock in shared or exclusive mode,
//! serializing compilations across processes that share the filesystem.
//! Acquisition is blocking but time-sliced: a non-blocking probe retries
//! every five seconds, so caller cancellation is observed between attempts.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cmodel_core::{ModelError, ModelResult};
use cmodel_module::Resolver;
use cmodel_plugin::LoadedPlugin;
use fs2::FileExt;
use tracing::debug;

const DEFAULT_PATH: &str = "/etc/onos/plugins";
const LOCK_FILE_NAME: &str = "cache.lock";
const LOCK_ATTEMPT_DELAY: Duration = Duration::from_secs(5);

/// Plugin cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Root directory holding the hash partitions.
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            path: PathBuf::from(DEFAULT_PATH),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockMode {
    Unlocked,
    Shared,
    Exclusive,
}

/// Sentinel handle plus the mode currently held on it. The handle stays open
/// for the full duration of the lock; it is reopened when the partition
/// changes between lock cycles.
struct SentinelState {
    sentinel: Option<(PathBuf, File)>,
    mode: LockMode,
}

/// A cache of compiled model plugins.
pub struct PluginCache {
    config: CacheConfig,
    resolver: Arc<Resolver>,
    state: Mutex<SentinelState>,
}

impl PluginCache {
    pub fn new(mut config: CacheConfig, resolver: Arc<Resolver>) -> Self {
        if config.path.as_os_str().is_empty() {
            config.path = PathBuf::from(DEFAULT_PATH);
        }
        PluginCache {
            config,
            resolver,
            state: Mutex::new(SentinelState {
                sentinel: None,
                mode: LockMode::Unlocked,
            }),
        }
    }

    /// Acquires the exclusive lock over the cache partition.
    pub async fn lock(&self) -> ModelResult<()> {
        self.acquire(LockMode::Exclusive).await
    }

    /// Acquires the shared lock over the cache partition.
    pub async fn read_lock(&self) -> ModelResult<()> {
        self.acquire(LockMode::Shared).await
    }

    /// Releases the exclusive lock.
    pub fn unlock(&self) -> ModelResult<()> {
        self.release()
    }

    /// Releases the shared lock.
    pub fn read_unlock(&self) -> ModelResult<()> {
        self.release()
    }

    /// Whether this cache currently holds the exclusive lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().expect("cache lock state poisoned").mode == LockMode::Exclusive
    }

    /// Whether this cache currently holds a shared or exclusive lock.
    pub fn is_read_locked(&self) -> bool {
        self.state.lock().expect("cache lock state poisoned").mode != LockMode::Unlocked
    }

    /// Path of the artifact for the given plugin in the current partition.
    pub async fn get_path(&self, name: &str, version: &str) -> ModelResult<PathBuf> {
        Ok(self
            .partition_dir()
            .await?
            .join(format!("{name}-{version}.so")))
    }

    /// Whether the given plugin is present in the current partition. Requires
    /// a held lock.
    pub async fn cached(&self, name: &str, version: &str) -> ModelResult<bool> {
        if !self.is_read_locked() {
            return Err(ModelError::conflict("cache is not locked"));
        }
        let path = self.get_path(name, version).await?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Loads the given plugin from the current partition. Requires a held
    /// lock.
    pub async fn load(&self, name: &str, version: &str) -> ModelResult<LoadedPlugin> {
        if !self.is_read_locked() {
            return Err(ModelError::conflict("cache is not locked"));
        }
        let path = self.get_path(name, version).await?;
        cmodel_plugin::load(&path)
    }

    /// The partition directory for the currently resolved manifest hash.
    async fn partition_dir(&self) -> ModelResult<PathBuf> {
        let (_, hash) = self.resolver.resolve().await?;
        Ok(self.config.path.join(hash.to_base64url()))
    }

    async fn acquire(&self, mode: LockMode) -> ModelResult<()> {
        let dir = self.partition_dir().await?;
        tokio::fs::create_dir_all(&dir).await?;
        let sentinel_path = dir.join(LOCK_FILE_NAME);

        loop {
            {
                let mut state = self.state.lock().expect("cache lock state poisoned");
                // Single-logical-owner semantics: a lock held by this instance
                // counts as contention for the next caller.
                if state.mode == LockMode::Unlocked {
                    let file = state.ensure_sentinel(&sentinel_path)?;
                    let probe = match mode {
                        LockMode::Shared => FileExt::try_lock_shared(file),
                        LockMode::Exclusive => FileExt::try_lock_exclusive(file),
                        LockMode::Unlocked => unreachable!(),
                    };
                    match probe {
                        Ok(()) => {
                            state.mode = mode;
                            return Ok(());
                        }
                        Err(e) if is_contended(&e) => {}
                        Err(e) => {
                            return Err(ModelError::internal(format!(
                                "failed to lock cache: {e}"
                            )));
                        }
                    }
                }
            }
            debug!(path = %sentinel_path.display(), "cache lock contended, retrying");
            tokio::time::sleep(LOCK_ATTEMPT_DELAY).await;
        }
    }

    fn release(&self) -> ModelResult<()> {
        let mut state = self.state.lock().expect("cache lock state poisoned");
        if let Some((_, file)) = &state.sentinel {
            FileExt::unlock(file)
                .map_err(|e| ModelError::internal(format!("failed to unlock cache: {e}")))?;
        }
        state.mode = LockMode::Unlocked;
        Ok(())
    }
}

impl SentinelState {
    /// Opens (or reopens, after a partition change) the sentinel file.
    fn ensure_sentinel(&mut self, path: &Path) -> ModelResult<&File> {
        let stale = match &self.sentinel {
            Some((held_path, _)) => held_path != path,
            None => true,
        };
        if stale {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .map_err(|e| {
                    ModelError::internal(format!(
                        "failed to open cache lock '{}': {e}",
                        path.display()
                    ))
                })?;
            self.sentinel = Some((path.to_path_buf(), file));
        }
        Ok(&self.sentinel.as_ref().expect("sentinel just ensured").1)
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cmodel_module::ResolverConfig;

    const MANIFEST: &str = "module github.com/onosproject/onos-config\n\ngo 1.16\n";

    fn seeded_cache(cache_dir: &Path, mod_dir: &Path, hash: &[u8]) -> PluginCache {
        std::fs::write(mod_dir.join("go.mod"), MANIFEST).unwrap();
        std::fs::write(mod_dir.join("mod.md5"), hash).unwrap();
        let resolver = Arc::new(Resolver::new(ResolverConfig {
            path: mod_dir.to_path_buf(),
            target: String::new(),
            replace: String::new(),
        }));
        PluginCache::new(
            CacheConfig {
                path: cache_dir.to_path_buf(),
            },
            resolver,
        )
    }

    #[tokio::test]
    async fn get_path_is_partitioned_by_hash() {
        let cache_dir = tempfile::tempdir().unwrap();
        let mod_dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(cache_dir.path(), mod_dir.path(), b"h1:abc=");

        let path = cache.get_path("foo", "1.0.0").await.unwrap();
        let partition = path.parent().unwrap();
        assert_eq!(path.file_name().unwrap(), "foo-1.0.0.so");
        assert_eq!(partition.parent().unwrap(), cache_dir.path());
        let expected = cmodel_module::ManifestHash::new(b"h1:abc=".to_vec()).to_base64url();
        assert_eq!(partition.file_name().unwrap().to_str().unwrap(), expected);
    }

    #[tokio::test]
    async fn distinct_hashes_use_distinct_partitions() {
        let cache_dir = tempfile::tempdir().unwrap();
        let mod_dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(cache_dir.path(), mod_dir.path(), b"h1:one=");
        let first = cache.get_path("x", "1.0.0").await.unwrap();

        // Re-seed the resolver state with a different hash; the partition
        // must roll with it.
        std::fs::write(mod_dir.path().join("mod.md5"), b"h1:two=").unwrap();
        let second = cache.get_path("x", "1.0.0").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn cached_requires_a_held_lock() {
        let cache_dir = tempfile::tempdir().unwrap();
        let mod_dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(cache_dir.path(), mod_dir.path(), b"h1:abc=");

        let err = cache.cached("foo", "1.0.0").await.unwrap_err();
        assert!(err.is_conflict());
        let err = cache.load("foo", "1.0.0").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn lock_cycle_tracks_modes() {
        let cache_dir = tempfile::tempdir().unwrap();
        let mod_dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(cache_dir.path(), mod_dir.path(), b"h1:abc=");

        assert!(!cache.is_locked());
        cache.lock().await.unwrap();
        assert!(cache.is_locked());
        assert!(cache.is_read_locked());
        assert!(!cache.cached("foo", "1.0.0").await.unwrap());
        cache.unlock().unwrap();
        assert!(!cache.is_read_locked());

        cache.read_lock().await.unwrap();
        assert!(!cache.is_locked());
        assert!(cache.is_read_locked());
        cache.read_unlock().unwrap();
    }

    #[tokio::test]
    async fn locking_creates_the_sentinel() {
        let cache_dir = tempfile::tempdir().unwrap();
        let mod_dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(cache_dir.path(), mod_dir.path(), b"h1:abc=");

        cache.lock().await.unwrap();
        let partition = cache
            .get_path("foo", "1.0.0")
            .await
            .unwrap()
            .parent()
            .unwrap()
            .to_path_buf();
        assert!(partition.join(LOCK_FILE_NAME).exists());
        cache.unlock().unwrap();
    }

    #[tokio::test]
    async fn cached_sees_artifacts_on_disk() {
        let cache_dir = tempfile::tempdir().unwrap();
        let mod_dir = tempfile::tempdir().unwrap();
        let cache = seeded_cache(cache_dir.path(), mod_dir.path(), b"h1:abc=");

        cache.read_lock().await.unwrap();
        assert!(!cache.cached("foo", "1.0.0").await.unwrap());

        let path = cache.get_path("foo", "1.0.0").await.unwrap();
        std::fs::write(&path, b"\x7fELF").unwrap();
        assert!(cache.cached("foo", "1.0.0").await.unwrap());
        cache.read_unlock().unwrap();
    }
}
