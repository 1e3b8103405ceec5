//! The module resolver.
//!
//! Given a configured `{target, replace}` pair, `resolve` materializes the
//! dependency manifest of the target module plus the upstream ziphash that
//! content-addresses it. The pair is persisted to `{path}/go.mod` and
//! `{path}/mod.md5` and reused on later calls as long as both files read and
//! parse.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use cmodel_core::{ModelError, ModelResult};
use serde::Deserialize;
use tokio::fs;
use tracing::{error, info};

use crate::exec::go_exec;
use crate::modfile::{ModFile, encode_path, split_path_version};

const DEFAULT_PATH: &str = "/etc/onos/mod";
const MOD_FILE: &str = "go.mod";
const HASH_FILE: &str = "mod.md5";

/// Content hash identifying a resolved dependency manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestHash(Vec<u8>);

impl ManifestHash {
    pub fn new(bytes: Vec<u8>) -> Self {
        ManifestHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// URL-safe base64 form used for cache partition directory names.
    pub fn to_base64url(&self) -> String {
        URL_SAFE.encode(&self.0)
    }
}

/// Module resolver configuration.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Directory holding the persisted manifest and hash.
    pub path: PathBuf,
    /// Target module reference, `path[@version]`.
    pub target: String,
    /// Optional replacement module reference, `path[@version]`.
    pub replace: String,
}

/// A deterministic, disk-memoized module resolver.
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(mut config: ResolverConfig) -> Self {
        if config.path.as_os_str().is_empty() {
            config.path = PathBuf::from(DEFAULT_PATH);
        }
        Resolver { config }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Returns the canonical dependency manifest and hash for the configured
    /// target, fetching and persisting them on first use.
    pub async fn resolve(&self) -> ModelResult<(ModFile, ManifestHash)> {
        if let Some(memoized) = self.read_memoized().await {
            return Ok(memoized);
        }

        let (manifest, hash) = self.fetch().await?;
        self.persist(&manifest, &hash).await?;
        Ok((manifest, hash))
    }

    /// Reads the persisted pair; any unreadable or unparsable file forces a
    /// fresh fetch.
    async fn read_memoized(&self) -> Option<(ModFile, ManifestHash)> {
        let mod_text = fs::read_to_string(self.mod_path()).await.ok()?;
        let hash_bytes = fs::read(self.hash_path()).await.ok()?;
        let manifest = ModFile::parse(&mod_text).ok()?;
        Some((manifest, ManifestHash::new(hash_bytes)))
    }

    async fn fetch(&self) -> ModelResult<(ModFile, ManifestHash)> {
        let target = self.config.target.as_str();
        let replace = self.config.replace.as_str();
        if target.is_empty() {
            return Err(ModelError::invalid("no target module configured"));
        }

        let (target_path, _) = split_path_version(target);
        info!(target, "fetching module");

        let tmp = tempfile::tempdir()
            .map_err(|e| ModelError::internal(format!("failed to create temp module dir: {e}")))?;

        // Stub manifest used to pull the target module through the toolchain.
        let mut stub = String::from("module m\n");
        if !replace.is_empty() {
            let (replace_path, replace_version) = split_path_version(replace);
            stub.push_str(&format!(
                "replace {target_path} => {replace_path} {}\n",
                replace_version.unwrap_or_default()
            ));
        }
        let stub_path = tmp.path().join(MOD_FILE);
        fs::write(&stub_path, stub).await?;

        go_exec(tmp.path(), &["get", "-d", target])
            .await
            .inspect_err(|e| error!(target, "failed to fetch module: {e}"))?;

        // The toolchain rewrote the stub with the resolved dependency set.
        let stub_text = fs::read_to_string(&stub_path).await?;
        let stub_file = ModFile::parse(&stub_text)?;

        let (resolved_path, resolved_version) = self.resolved_target(&stub_file, target_path)?;

        let encoded = encode_path(&resolved_path)?;
        let mod_cache = go_mod_cache_dir().await?;
        let entry_dir = mod_cache.join("cache").join("download").join(encoded).join("@v");

        let manifest_path = entry_dir.join(format!("{resolved_version}.mod"));
        let manifest_text = fs::read_to_string(&manifest_path).await.map_err(|e| {
            ModelError::internal(format!(
                "failed to read module manifest '{}': {e}",
                manifest_path.display()
            ))
        })?;
        let manifest = ModFile::parse(&manifest_text)?;

        let hash_path = entry_dir.join(format!("{resolved_version}.ziphash"));
        let hash_bytes = fs::read(&hash_path).await.map_err(|e| {
            ModelError::internal(format!(
                "failed to read module hash '{}': {e}",
                hash_path.display()
            ))
        })?;

        Ok((manifest, ManifestHash::new(hash_bytes)))
    }

    /// Selects the effective `(path, version)` of the target module from the
    /// toolchain-resolved stub, preferring replace entries when a replacement
    /// was configured.
    fn resolved_target(
        &self,
        stub: &ModFile,
        target_path: &str,
    ) -> ModelResult<(String, String)> {
        if self.config.replace.is_empty() {
            let requirement = stub.require_for(target_path).ok_or_else(|| {
                ModelError::internal(format!(
                    "target module '{target_path}' not resolved by the toolchain"
                ))
            })?;
            Ok((requirement.path.clone(), requirement.version.clone()))
        } else {
            let replacement = stub.replacement_for(target_path).ok_or_else(|| {
                ModelError::internal(format!(
                    "replacement for '{target_path}' not resolved by the toolchain"
                ))
            })?;
            let version = replacement.new_version.clone().ok_or_else(|| {
                ModelError::invalid(format!(
                    "replacement for '{target_path}' carries no version"
                ))
            })?;
            Ok((replacement.new_path.clone(), version))
        }
    }

    /// Writes the resolved pair, leaving nothing behind on failure.
    async fn persist(&self, manifest: &ModFile, hash: &ManifestHash) -> ModelResult<()> {
        fs::create_dir_all(&self.config.path).await?;

        let mod_path = self.mod_path();
        fs::write(&mod_path, manifest.format())
            .await
            .inspect_err(|e| error!("failed to write go.mod: {e}"))?;
        if let Err(e) = fs::write(self.hash_path(), hash.as_bytes()).await {
            error!("failed to write module hash: {e}");
            let _ = fs::remove_file(&mod_path).await;
            return Err(e.into());
        }

        make_world_readable(&mod_path).await;
        make_world_readable(&self.hash_path()).await;
        Ok(())
    }

    fn mod_path(&self) -> PathBuf {
        self.config.path.join(MOD_FILE)
    }

    fn hash_path(&self) -> PathBuf {
        self.config.path.join(HASH_FILE)
    }
}

/// Locates the toolchain's local content-addressed module cache.
async fn go_mod_cache_dir() -> ModelResult<PathBuf> {
    #[derive(Deserialize)]
    struct GoEnv {
        #[serde(rename = "GOPATH", default)]
        gopath: String,
        #[serde(rename = "GOMODCACHE", default)]
        gomodcache: String,
    }

    let cwd = std::env::current_dir()?;
    let out = go_exec(&cwd, &["env", "-json", "GOPATH", "GOMODCACHE"]).await?;
    let env: GoEnv = serde_json::from_str(&out)
        .map_err(|e| ModelError::internal(format!("failed to parse go env output: {e}")))?;
    if env.gomodcache.is_empty() {
        // Toolchains predating GOMODCACHE keep the cache under GOPATH.
        Ok(PathBuf::from(env.gopath).join("pkg").join("mod"))
    } else {
        Ok(PathBuf::from(env.gomodcache))
    }
}

#[cfg(unix)]
async fn make_world_readable(path: &Path) {
    use std::fs::Permissions;
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, Permissions::from_mode(0o666)).await;
}

#[cfg(not(unix))]
async fn make_world_readable(_path: &Path) {}
