use crate::definition::reference::PackageReference;
use crate::engine::build_state::BuildState;
use crate::error::{CookError, CookResult};
use crate::utils::{write_atomic, FileWalker};
use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tempfile::TempDir;
use tracing::{debug, info, warn};

const STAGING_DIR: &str = ".staging";
const PACKAGE_DIR: &str = "package";
const METADATA_FILE: &str = "metadata.json";
const LATEST_FILE: &str = "latest";

/// What consumers of a package need to find it.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct CppInfo {
    pub builddirs: Vec<PathBuf>,
    pub includedirs: Vec<PathBuf>,
    pub libdirs: Vec<PathBuf>,
}

impl CppInfo {
    /// Header-only libraries expose only their include tree. Build helpers are looked up in the
    /// build folder.
    pub fn for_build(build_path: &Path, shared: bool) -> Self {
        CppInfo {
            builddirs: vec![build_path.to_path_buf()],
            includedirs: vec![PathBuf::from("include")],
            libdirs: if shared {
                vec![PathBuf::from("lib")]
            } else {
                vec![]
            },
        }
    }

    /// Relative directories are taken to be inside `folder`.
    fn rebased(&self, folder: &Path) -> Self {
        let rebase = |dirs: &[PathBuf]| -> Vec<PathBuf> {
            dirs.iter().map(|d| folder.join(d)).collect()
        };

        CppInfo {
            builddirs: rebase(&self.builddirs),
            includedirs: rebase(&self.includedirs),
            libdirs: rebase(&self.libdirs),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChangelogRecord {
    pub version: String,
    pub text: String,
}

/// Written next to every published package.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub reference: String,
    pub description: String,
    pub url: Option<String>,
    pub license: Vec<String>,
    pub topics: Vec<String>,
    pub options: BTreeMap<String, String>,
    pub settings: BTreeMap<String, String>,
    pub cppstd: Option<String>,
    pub build_policy: String,
    pub changelog: Vec<ChangelogRecord>,
    pub cpp_info: CppInfo,
    /// Package relative path to hex SHA-256.
    pub manifest: BTreeMap<String, String>,
    pub created: u64,
}

impl PackageMetadata {
    pub fn new(state: &BuildState, cpp_info: CppInfo, manifest: BTreeMap<String, String>) -> Self {
        let recipe = state.recipe;
        let platform = &state.platform;

        let mut settings = BTreeMap::new();
        if let Some(os) = &platform.os {
            settings.insert("os".to_string(), os.clone());
        }
        if let Some(arch) = &platform.arch {
            settings.insert("arch".to_string(), arch.clone());
        }
        if let Some(build_type) = platform.build_type {
            settings.insert("build_type".to_string(), build_type.name().to_string());
        }
        if let Some(compiler) = &platform.compiler {
            settings.insert("compiler".to_string(), compiler.kind.name().to_string());
            settings.insert("compiler.version".to_string(), compiler.version.to_string());
            if let Some(libcxx) = &compiler.libcxx {
                settings.insert("compiler.libcxx".to_string(), libcxx.clone());
            }
        }

        PackageMetadata {
            reference: recipe.reference().to_string(),
            description: recipe.description.clone(),
            url: recipe.url.clone(),
            license: recipe.license.clone(),
            topics: recipe.topics.clone(),
            options: state
                .options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            settings,
            cppstd: state.cppstd.map(|s| s.to_string()),
            build_policy: state.build_policy().name().to_string(),
            changelog: recipe
                .changelog
                .iter()
                .map(|e| ChangelogRecord {
                    version: e.version.clone(),
                    text: e.text.clone(),
                })
                .collect(),
            cpp_info,
            manifest,
            created: state
                .build_time
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// A package being assembled. Dropping it without publishing removes everything it holds.
#[derive(Debug)]
pub struct StagedPackage {
    dir: TempDir,
}

impl StagedPackage {
    /// Install prefix for the package contents.
    pub fn package_dir(&self) -> PathBuf {
        self.dir.path().join(PACKAGE_DIR)
    }

    pub async fn manifest(&self) -> CookResult<BTreeMap<String, String>> {
        let root = self.package_dir();
        let mut manifest = BTreeMap::new();

        for relative in FileWalker::collect_relative(&root).await? {
            let contents = tokio::fs::read(root.join(&relative)).await?;
            let key = relative.to_string_lossy().replace('\\', "/");
            manifest.insert(key, hex::encode(digest(&SHA256, &contents)));
        }

        Ok(manifest)
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PublishedPackage {
    pub reference: PackageReference,
    /// Holds `package/` and the metadata file.
    pub folder: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    pub reference: PackageReference,
    pub package_folder: PathBuf,
    pub cpp_info: CppInfo,
}

/// Local package cache.
///
/// `<root>/<name>/<version>/<user|_>/<channel|_>/<revision>/` holds one package, and the
/// channel directory's `latest` file names the revision published last.
#[derive(Debug)]
pub struct PackageStore {
    root: PathBuf,
}

impl PackageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PackageStore { root: root.into() }
    }

    fn channel_path(&self, reference: &PackageReference) -> PathBuf {
        self.root
            .join(&reference.name)
            .join(&reference.version)
            .join(reference.user.as_deref().unwrap_or("_"))
            .join(reference.channel.as_deref().unwrap_or("_"))
    }

    pub async fn stage(&self) -> CookResult<StagedPackage> {
        let staging = self.root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging).await?;

        let dir = TempDir::new_in(&staging)?;
        tokio::fs::create_dir_all(dir.path().join(PACKAGE_DIR)).await?;

        debug!(path = %dir.path().display(), "staging package");
        Ok(StagedPackage { dir })
    }

    /// Moves a completely staged package into place. A previous package with the same revision
    /// is replaced.
    pub async fn publish(
        &self,
        staged: StagedPackage,
        reference: &PackageReference,
        metadata: &PackageMetadata,
    ) -> CookResult<PublishedPackage> {
        let revision = reference
            .revision
            .as_deref()
            .ok_or_else(|| CookError::InvalidReference {
                input: reference.to_string(),
                reason: "published packages need a revision",
            })?;

        let install_error = |what: &str, e: std::io::Error| CookError::Install {
            detail: format!("unable to {} {}: {}", what, reference, e),
        };

        let json = serde_json::to_vec_pretty(metadata).map_err(|e| CookError::Install {
            detail: format!("unable to serialize metadata for {}: {}", reference, e),
        })?;
        tokio::fs::write(staged.dir.path().join(METADATA_FILE), json)
            .await
            .map_err(|e| install_error("write metadata for", e))?;

        let channel = self.channel_path(reference);
        let folder = channel.join(revision);

        tokio::fs::create_dir_all(&channel)
            .await
            .map_err(|e| install_error("create store folder for", e))?;

        self.replace_dir(staged.dir.path(), &folder)
            .await
            .map_err(|e| install_error("publish", e))?;
        // The staging directory no longer exists under its old name.
        let _ = staged.dir.into_path();

        write_atomic(&channel.join(LATEST_FILE), revision.as_bytes())
            .map_err(|e| install_error("update latest revision of", e))?;

        info!(%reference, folder = %folder.display(), "published package");
        Ok(PublishedPackage {
            reference: reference.clone(),
            folder,
        })
    }

    /// Renames `from` to `to`. An existing `to` is moved into the staging area first, put back
    /// if the rename fails and deleted only once the new folder is in place.
    async fn replace_dir(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        if tokio::fs::metadata(to).await.is_err() {
            return tokio::fs::rename(from, to).await;
        }

        let staging = self.root.join(STAGING_DIR);
        tokio::fs::create_dir_all(&staging).await?;
        let aside = TempDir::new_in(&staging)?;
        let previous = aside.path().join("previous");
        tokio::fs::rename(to, &previous).await?;

        if let Err(e) = tokio::fs::rename(from, to).await {
            if let Err(restore) = tokio::fs::rename(&previous, to).await {
                let kept = aside.into_path();
                warn!(
                    path = %kept.display(),
                    error = %restore,
                    "unable to restore the previous package"
                );
            }
            return Err(e);
        }

        debug!(folder = %to.display(), "replaced previous package");
        Ok(())
    }

    /// Finds a published package. Without a revision the latest published one is used; every
    /// other component must match exactly.
    pub async fn resolve(&self, reference: &PackageReference) -> CookResult<ResolvedDependency> {
        let not_found = |reason: String| CookError::DependencyResolution {
            reference: reference.clone(),
            reason,
        };

        let channel = self.channel_path(reference);

        let revision = match &reference.revision {
            Some(revision) => revision.clone(),
            None => tokio::fs::read_to_string(channel.join(LATEST_FILE))
                .await
                .map_err(|_| not_found("no package in the local store".to_string()))?
                .trim()
                .to_string(),
        };

        let folder = channel.join(&revision);
        let raw = tokio::fs::read(folder.join(METADATA_FILE))
            .await
            .map_err(|_| not_found(format!("revision {} is not in the local store", revision)))?;

        let metadata: PackageMetadata = serde_json::from_slice(&raw)
            .map_err(|e| not_found(format!("corrupt package metadata: {}", e)))?;

        let pinned = reference.unpinned().with_revision(&revision);
        if metadata.reference != pinned.to_string() {
            return Err(not_found(format!(
                "store entry describes {}",
                metadata.reference
            )));
        }

        let package_folder = folder.join(PACKAGE_DIR);
        Ok(ResolvedDependency {
            reference: pinned,
            cpp_info: metadata.cpp_info.rebased(&package_folder),
            package_folder,
        })
    }
}
