//! Archives already sitting in the download cache.

use std::path::{Path, PathBuf};

use crate::config::DeployConfig;
use crate::error::{Error, Result};
use crate::release::NamedArchive;

/// A previously downloaded archive found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArchive {
    pub name: String,
    pub path: PathBuf,
}

impl NamedArchive for CachedArchive {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Regular files in `cache_dir` carrying the archive suffix, sorted by name.
///
/// A missing cache directory yields an empty list.
pub fn cached_archives(cache_dir: &Path, config: &DeployConfig) -> Result<Vec<CachedArchive>> {
    let entries = match std::fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(cache_dir, e)),
    };

    let mut archives = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(cache_dir, e))?;
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.ends_with(&config.archive_suffix) {
            archives.push(CachedArchive {
                path: entry.path(),
                name,
            });
        }
    }
    archives.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(archives)
}
