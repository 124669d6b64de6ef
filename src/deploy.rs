//! Unpacking cached archives into the Android project tree.
//!
//! Each regular-file entry is routed purely by its path:
//!
//! 1. ignored extensions are skipped;
//! 2. anything below a `resource` segment goes to the resource tree, keeping
//!    the segments after the first `resource` (skipped if those contain `..`);
//! 3. shared libraries go flat into the per-ABI native-library dir unless
//!    excluded;
//! 4. everything else is skipped.
//!
//! There is no rollback: a failure mid-archive leaves whatever was already
//! written in place.

use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use walkdir::WalkDir;

use crate::config::DeployConfig;
use crate::error::{Error, Result};

/// Per-archive counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeployStats {
    pub resource: usize,
    pub libraries: usize,
    pub skipped: usize,
}

/// Where a single archive entry ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Relative path below the resource root.
    Resource(PathBuf),
    /// Bare file name inside the ABI's native-library dir.
    Library(OsString),
    /// Not written, counted as skipped.
    Skip,
    /// Not written, not counted (`resource` with nothing after it).
    Discard,
}

/// Decide the destination of an archive entry from its internal path.
pub fn route(entry_path: &Path, config: &DeployConfig) -> Route {
    // `None` marks a `..` segment; root and prefix components are dropped.
    let segments: Vec<Option<&OsStr>> = entry_path
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(Some(segment)),
            Component::ParentDir => Some(None),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => None,
        })
        .collect();
    let Some(&Some(file_name)) = segments.last() else {
        return Route::Skip;
    };

    let ignored = Path::new(file_name)
        .extension()
        .is_some_and(|ext| config.ignored_extensions.iter().any(|i| ext == i.as_str()));
    if ignored {
        return Route::Skip;
    }

    let anchor = OsStr::new(&config.resource_anchor);
    if let Some(idx) = segments.iter().position(|s| *s == Some(anchor)) {
        let rest = &segments[idx + 1..];
        if rest.is_empty() {
            return Route::Discard;
        }
        let Some(rel) = rest.iter().copied().collect::<Option<PathBuf>>() else {
            tracing::warn!("    [SKIP] entry escapes resource dir: {}", entry_path.display());
            return Route::Skip;
        };
        return Route::Resource(rel);
    }

    let is_library = file_name
        .to_str()
        .is_some_and(|name| name.ends_with(&config.library_suffix));
    if is_library {
        if config
            .excluded_libraries
            .iter()
            .any(|ex| file_name == ex.as_str())
        {
            return Route::Skip;
        }
        return Route::Library(file_name.to_os_string());
    }

    Route::Skip
}

/// Deploys archives for one project root.
pub struct Deployer<'a> {
    config: &'a DeployConfig,
    project_root: PathBuf,
}

impl<'a> Deployer<'a> {
    pub fn new(config: &'a DeployConfig, project_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_root: project_root.into(),
        }
    }

    /// Remove the whole resource tree. Returns whether anything was removed.
    pub fn clean_resources(&self) -> Result<bool> {
        let dir = self.config.resource_root(&self.project_root);
        if !dir.exists() {
            return Ok(false);
        }
        tracing::info!("[DELETE] Cleaning resource dir: {}", dir.display());
        std::fs::remove_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(true)
    }

    /// Delete shared libraries from the ABI's native-library dir, sparing
    /// protected names and anything that is not a regular file.
    ///
    /// Returns the deleted file names.
    pub fn clean_libraries(&self, abi: &str) -> Result<Vec<String>> {
        let dir = self.config.library_dir(&self.project_root, abi);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&dir, e)),
        };
        let extension = self.config.library_suffix.trim_start_matches('.');

        let mut deleted = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| Error::io(&path, e))?;
            if !file_type.is_file() || path.extension() != Some(OsStr::new(extension)) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.config.protected_libraries.contains(&name) {
                continue;
            }
            std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
            tracing::info!("    [DELETE] {abi}/{name}");
            deleted.push(name);
        }
        deleted.sort();
        Ok(deleted)
    }

    /// Unpack `archive` for `abi`, optionally cleaning its libraries first.
    pub fn deploy_archive(&self, archive: &Path, abi: &str, clean: bool) -> Result<DeployStats> {
        if clean {
            self.clean_libraries(abi)?;
        }

        let lib_dir = self.config.library_dir(&self.project_root, abi);
        let resource_root = self.config.resource_root(&self.project_root);
        std::fs::create_dir_all(&lib_dir).map_err(|e| Error::io(&lib_dir, e))?;
        std::fs::create_dir_all(&resource_root).map_err(|e| Error::io(&resource_root, e))?;

        let archive_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!("  [EXTRACT] {archive_name} -> {abi}");

        let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
        let mut reader = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

        let mut stats = DeployStats::default();
        for entry in reader.entries().map_err(|e| Error::io(archive, e))? {
            let mut entry = entry.map_err(|e| Error::io(archive, e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let entry_path = entry
                .path()
                .map_err(|e| Error::io(archive, e))?
                .into_owned();

            match route(&entry_path, self.config) {
                Route::Resource(rel) => {
                    write_entry(&mut entry, &resource_root.join(rel))?;
                    stats.resource += 1;
                }
                Route::Library(name) => {
                    write_entry(&mut entry, &lib_dir.join(name))?;
                    stats.libraries += 1;
                }
                Route::Skip => stats.skipped += 1,
                Route::Discard => {}
            }
        }

        tracing::info!(
            "    resource: {} files, so: {} files, skipped: {}",
            stats.resource,
            stats.libraries,
            stats.skipped
        );
        Ok(stats)
    }

    /// Describe what the destination trees hold for `abis`.
    pub fn summarize(&self, abis: &[String]) -> Result<DeploySummary> {
        let extension = self.config.library_suffix.trim_start_matches('.');
        let mut libraries = Vec::new();
        for abi in abis {
            let dir = self.config.library_dir(&self.project_root, abi);
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut names = Vec::new();
            for entry in entries {
                let path = entry.map_err(|e| Error::io(&dir, e))?.path();
                if path.extension() == Some(OsStr::new(extension)) {
                    if let Some(name) = path.file_name() {
                        names.push(name.to_string_lossy().into_owned());
                    }
                }
            }
            names.sort();
            libraries.push((abi.clone(), names));
        }

        let resource_root = self.config.resource_root(&self.project_root);
        let mut resource_files = 0;
        let mut resource_bytes = 0;
        if resource_root.exists() {
            for entry in WalkDir::new(&resource_root) {
                let entry = entry.map_err(|e| Error::io(&resource_root, e.into()))?;
                if entry.file_type().is_file() {
                    let meta = entry
                        .metadata()
                        .map_err(|e| Error::io(entry.path(), e.into()))?;
                    resource_files += 1;
                    resource_bytes += meta.len();
                }
            }
        }

        Ok(DeploySummary {
            libraries,
            resource_files,
            resource_bytes,
        })
    }
}

/// Post-deploy view of the destination trees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploySummary {
    /// `(abi, sorted library names)` for every ABI whose dir exists.
    pub libraries: Vec<(String, Vec<String>)>,
    pub resource_files: usize,
    pub resource_bytes: u64,
}

fn write_entry(entry: &mut impl Read, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut out = File::create(dest).map_err(|e| Error::io(dest, e))?;
    io::copy(entry, &mut out).map_err(|e| Error::io(dest, e))?;
    Ok(())
}
