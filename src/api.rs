use std::path::{Path, PathBuf};

use crate::cache::cached_archives;
use crate::config::DeployConfig;
use crate::deploy::{DeployStats, DeploySummary, Deployer};
use crate::downloader::{CacheStatus, Downloader};
use crate::error::{Error, Result};
use crate::progress::{default_progress_fn, ProgressFn};
use crate::select::{select_archives, select_last_archives, AbiFilter};

// ──────────────────────────────────────────────────────────────────────────────
// Api
// ──────────────────────────────────────────────────────────────────────────────

/// Top-level entry-point with a chainable builder API.
///
/// # Example
/// ```rust,no_run
/// use maafetch::{Api, DeployConfig};
///
/// #[tokio::main]
/// async fn main() {
///     let report = Api::new(DeployConfig::from_env())
///         .set_project_root("./MaaMeow")
///         .clean(true)
///         .latest()
///         .deploy()
///         .await
///         .unwrap();
///     println!("deployed {} archive(s)", report.archives.len());
/// }
/// ```
pub struct Api {
    config: DeployConfig,
    project_root: PathBuf,
    abi: AbiFilter,
    clean: bool,
    progress: Option<ProgressFn>,
}

impl Api {
    /// Create an `Api` deploying into the current directory, all ABIs, no clean.
    pub fn new(config: DeployConfig) -> Self {
        Self {
            config,
            project_root: PathBuf::from("."),
            abi: AbiFilter::All,
            clean: false,
            progress: Some(default_progress_fn()),
        }
    }

    /// Set the project root that all destination paths are relative to (builder).
    pub fn set_project_root(mut self, root: impl AsRef<Path>) -> Self {
        self.project_root = root.as_ref().to_path_buf();
        self
    }

    /// Restrict the run to one ABI, or all of them (builder).
    pub fn abi(mut self, abi: AbiFilter) -> Self {
        self.abi = abi;
        self
    }

    /// Wipe the resource tree and prune deployed libraries first (builder).
    pub fn clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    /// Override the progress callback (builder).
    pub fn set_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Disable progress output (builder).
    pub fn no_progress(mut self) -> Self {
        self.progress = None;
        self
    }

    /// Target the latest release.
    pub fn latest(self) -> DeployApi {
        DeployApi {
            api: self,
            source: Source::Latest,
        }
    }

    /// Target a specific release tag (e.g. `"v6.3.0"`).
    pub fn tag(self, tag: &str) -> DeployApi {
        DeployApi {
            api: self,
            source: Source::Tag(tag.to_owned()),
        }
    }

    /// Skip the network and deploy whatever the cache already holds.
    pub fn cached(self) -> DeployApi {
        DeployApi {
            api: self,
            source: Source::Cache,
        }
    }
}

// ──────────────────────────────────────────────────────────────────────────────
// DeployApi
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Latest,
    Tag(String),
    Cache,
}

/// Archive chosen for one ABI, before unpacking.
struct Planned {
    abi: String,
    path: PathBuf,
    cache: Option<CacheStatus>,
}

/// One archive unpacked during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployedArchive {
    pub abi: String,
    pub archive: PathBuf,
    /// `None` when the archive came from a cache-only run.
    pub cache: Option<CacheStatus>,
    pub stats: DeployStats,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Resolved release tag; `None` for cache-only runs.
    pub tag: Option<String>,
    pub archives: Vec<DeployedArchive>,
    pub summary: DeploySummary,
}

/// Intermediate builder after a release source has been chosen.
pub struct DeployApi {
    api: Api,
    source: Source,
}

impl DeployApi {
    /// Resolve, select, download and deploy, in that order.
    pub async fn deploy(self) -> Result<RunReport> {
        let Api {
            config,
            project_root,
            abi,
            clean,
            progress,
        } = self.api;

        let targets = abi.targets(&config)?;
        let deployer = Deployer::new(&config, &project_root);
        if clean {
            deployer.clean_resources()?;
        }

        let cache_dir = config.cache_root(&project_root);
        let (tag, plan) = match &self.source {
            Source::Latest => {
                let downloader = Downloader::new(&config)?.with_progress(progress);
                fetch(&downloader, &config, None, &abi, &targets, &cache_dir).await?
            }
            Source::Tag(tag) => {
                let downloader = Downloader::new(&config)?.with_progress(progress);
                fetch(&downloader, &config, Some(tag.as_str()), &abi, &targets, &cache_dir).await?
            }
            Source::Cache => {
                tracing::info!("[SKIP] Skipping download, using cache");
                (None, from_cache(&config, &targets, &cache_dir)?)
            }
        };

        tracing::info!("[DEPLOY] Deploying artifacts...");
        let mut archives = Vec::with_capacity(plan.len());
        for planned in plan {
            let stats = deployer.deploy_archive(&planned.path, &planned.abi, clean)?;
            archives.push(DeployedArchive {
                abi: planned.abi,
                archive: planned.path,
                cache: planned.cache,
                stats,
            });
        }

        let summary = deployer.summarize(&targets)?;
        Ok(RunReport {
            tag,
            archives,
            summary,
        })
    }
}

/// Resolve the release, select archives and make sure the targeted ones are cached.
async fn fetch(
    downloader: &Downloader<'_>,
    config: &DeployConfig,
    tag: Option<&str>,
    filter: &AbiFilter,
    targets: &[String],
    cache_dir: &Path,
) -> Result<(Option<String>, Vec<Planned>)> {
    let release = downloader.fetch_release(tag).await?;
    let selected = select_archives(release.assets, config)?;

    tracing::info!("[INFO] Found {} Android artifact(s):", selected.len());
    for (abi, asset) in &selected {
        let size_mb = asset.size as f64 / (1024.0 * 1024.0);
        tracing::info!("  {abi}: {} ({size_mb:.1} MB)", asset.name);
    }

    tracing::info!("[DOWNLOAD] Downloading to cache: {}", cache_dir.display());
    let mut plan = Vec::new();
    for abi in targets {
        let Some(asset) = selected.get(abi) else {
            if let AbiFilter::Only(_) = filter {
                return Err(Error::MissingAbi { abi: abi.clone() });
            }
            tracing::warn!("  release has no archive for {abi}, skipping");
            continue;
        };
        let (path, status) = downloader.download_to_cache(asset, cache_dir).await?;
        plan.push(Planned {
            abi: abi.clone(),
            path,
            cache: Some(status),
        });
    }
    Ok((Some(release.tag_name), plan))
}

/// Pick cached archives for the targeted ABIs with the same keyword rule.
///
/// Older versions stay in the cache; the last archive in name order wins.
fn from_cache(config: &DeployConfig, targets: &[String], cache_dir: &Path) -> Result<Vec<Planned>> {
    let archives = cached_archives(cache_dir, config)?;
    let mut selected = select_last_archives(archives, config);

    let plan: Vec<Planned> = targets
        .iter()
        .filter_map(|abi| {
            selected.remove(abi).map(|archive| Planned {
                abi: abi.clone(),
                path: archive.path,
                cache: None,
            })
        })
        .collect();

    if plan.is_empty() {
        return Err(Error::EmptyCache {
            dir: cache_dir.to_path_buf(),
        });
    }
    Ok(plan)
}
