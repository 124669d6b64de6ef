//! Mapping release archives onto ABI labels.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::config::DeployConfig;
use crate::error::{Error, Result};
use crate::release::NamedArchive;

/// Which ABIs a run touches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AbiFilter {
    #[default]
    All,
    Only(String),
}

impl FromStr for AbiFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(Self::All),
            "" => Err(Error::UnknownAbi(s.to_owned())),
            abi => Ok(Self::Only(abi.to_owned())),
        }
    }
}

impl AbiFilter {
    /// Resolve to concrete labels, rejecting labels the config does not map.
    pub fn targets(&self, config: &DeployConfig) -> Result<Vec<String>> {
        match self {
            Self::All => Ok(config.abis().map(str::to_owned).collect()),
            Self::Only(abi) if config.abis().any(|a| a == abi.as_str()) => Ok(vec![abi.clone()]),
            Self::Only(abi) => Err(Error::UnknownAbi(abi.clone())),
        }
    }
}

/// Map each ABI label to the single archive whose name carries its keyword.
///
/// An item qualifies only if its name ends with the archive suffix and
/// contains a keyword. A name carrying two keywords maps to both ABIs. Two
/// items matching the same ABI is an error rather than a silent overwrite.
/// An empty result is also an error.
pub fn select_archives<T, I>(items: I, config: &DeployConfig) -> Result<BTreeMap<String, T>>
where
    T: NamedArchive + Clone,
    I: IntoIterator<Item = T>,
{
    let mut selected: BTreeMap<String, T> = BTreeMap::new();

    for item in items {
        for abi in matching_abis(item.name(), config) {
            if let Some(existing) = selected.get(abi) {
                return Err(Error::AmbiguousArchive {
                    abi: abi.to_owned(),
                    first: existing.name().to_owned(),
                    second: item.name().to_owned(),
                });
            }
            selected.insert(abi.to_owned(), item.clone());
        }
    }

    if selected.is_empty() {
        return Err(Error::NoMatchingArchives {
            suffix: config.archive_suffix.clone(),
            keywords: config.keywords(),
        });
    }
    Ok(selected)
}

/// Map each ABI label to the last matching archive in iteration order.
///
/// The download cache keeps every version it ever fetched, so several
/// archives per ABI are expected there. Callers pass items sorted by name;
/// every archive passed over is logged. The result may be empty.
pub fn select_last_archives<T, I>(items: I, config: &DeployConfig) -> BTreeMap<String, T>
where
    T: NamedArchive + Clone,
    I: IntoIterator<Item = T>,
{
    let mut selected: BTreeMap<String, T> = BTreeMap::new();

    for item in items {
        for abi in matching_abis(item.name(), config) {
            if let Some(replaced) = selected.insert(abi.to_owned(), item.clone()) {
                tracing::warn!(
                    "  [CACHE] {abi}: using {} over {}",
                    item.name(),
                    replaced.name()
                );
            }
        }
    }
    selected
}

/// ABI labels whose keyword appears in `name`, if it carries the archive suffix.
fn matching_abis<'c>(name: &str, config: &'c DeployConfig) -> Vec<&'c str> {
    if !name.ends_with(&config.archive_suffix) {
        return Vec::new();
    }
    config
        .abi_map
        .iter()
        .filter(|(keyword, _)| name.contains(keyword.as_str()))
        .map(|(_, abi)| abi.as_str())
        .collect()
}
