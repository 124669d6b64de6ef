use serde::Deserialize;

/// A GitHub release. Does not contain all fields.
///
/// See the GitHub [docs](https://docs.github.com/en/rest/releases/releases?apiVersion=2022-11-28#get-the-latest-release)
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// A single downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Asset {
    pub name: String,
    #[serde(rename = "browser_download_url")]
    pub url: String,
    /// Declared size in bytes; the only cache-validity check.
    pub size: u64,
}

/// Anything that can be matched against ABI keywords by file name.
pub trait NamedArchive {
    fn name(&self) -> &str;
}

impl NamedArchive for Asset {
    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_release_document() {
        let raw = r#"{
            "tag_name": "v6.3.0",
            "name": "v6.3.0",
            "assets": [
                {
                    "name": "MAA-v6.3.0-android-arm64.tar.gz",
                    "browser_download_url": "https://github.com/o/r/releases/download/v6.3.0/MAA-v6.3.0-android-arm64.tar.gz",
                    "size": 1000,
                    "content_type": "application/gzip"
                }
            ]
        }"#;
        let release: Release = serde_json::from_str(raw).unwrap();
        assert_eq!(release.tag_name, "v6.3.0");
        assert_eq!(release.assets.len(), 1);
        assert_eq!(release.assets[0].size, 1000);
        assert!(release.assets[0].url.ends_with("android-arm64.tar.gz"));
    }

    #[test]
    fn missing_assets_is_empty() {
        let release: Release = serde_json::from_str(r#"{"tag_name": "v1"}"#).unwrap();
        assert!(release.assets.is_empty());
    }
}
