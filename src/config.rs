use std::path::{Path, PathBuf};
use std::time::Duration;

/// Read once and passed by reference into every component.
///
/// Defaults target the MAA Core release layout and the Android project tree
/// that consumes it. Builder methods exist so tests can point everything at a
/// fake API and a temporary project root.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// GitHub repository in `owner/repo` format.
    pub repo: String,
    /// Base URL of the release-hosting API.
    pub api_base: String,
    /// Ordered `(asset keyword, ABI label)` pairs.
    pub abi_map: Vec<(String, String)>,
    /// Suffix an asset name must carry to be considered an archive.
    pub archive_suffix: String,
    /// Suffix identifying shared libraries inside an archive.
    pub library_suffix: String,
    /// Libraries never copied out of an archive.
    pub excluded_libraries: Vec<String>,
    /// Libraries never removed from a native-library dir by clean mode.
    pub protected_libraries: Vec<String>,
    /// Entry extensions (without the dot) that are always skipped.
    pub ignored_extensions: Vec<String>,
    /// Path segment after which an entry is treated as a resource.
    pub resource_anchor: String,
    /// Resource destination, relative to the project root.
    pub resource_dir: PathBuf,
    /// Native-library root, relative to the project root.
    pub jni_libs_dir: PathBuf,
    /// Archive cache, relative to the project root.
    pub cache_dir: PathBuf,
    pub api_timeout: Duration,
    pub download_timeout: Duration,
    /// Bytes written per progress report.
    pub chunk_size: usize,
    /// Optional bearer token attached to every request.
    pub token: Option<String>,
    /// Optional HTTP/HTTPS proxy URL.
    pub proxy: Option<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            repo: "Aliothmoon/MaaAssistantArknights".to_owned(),
            api_base: "https://api.github.com".to_owned(),
            abi_map: vec![
                ("android-arm64".to_owned(), "arm64-v8a".to_owned()),
                ("android-x64".to_owned(), "x86_64".to_owned()),
            ],
            archive_suffix: ".tar.gz".to_owned(),
            library_suffix: ".so".to_owned(),
            excluded_libraries: vec!["libc++_shared.so".to_owned()],
            protected_libraries: vec!["libjnidispatch.so".to_owned()],
            ignored_extensions: vec!["h".to_owned()],
            resource_anchor: "resource".to_owned(),
            resource_dir: PathBuf::from("app/src/main/assets/MaaSync/MaaResource"),
            jni_libs_dir: PathBuf::from("app/src/main/jniLibs"),
            cache_dir: PathBuf::from(".maa-cache"),
            api_timeout: Duration::from_secs(30),
            download_timeout: Duration::from_secs(600),
            chunk_size: 1024 * 1024,
            token: None,
            proxy: None,
        }
    }
}

impl DeployConfig {
    /// Defaults plus credentials and proxy taken from the environment.
    ///
    /// The token comes from `GITHUB_TOKEN`; the proxy from `HTTP_PROXY`, then
    /// `HTTPS_PROXY`. Empty values are treated as unset.
    pub fn from_env() -> Self {
        let token = non_empty_var("GITHUB_TOKEN");
        let proxy = non_empty_var("HTTP_PROXY").or_else(|| non_empty_var("HTTPS_PROXY"));

        Self {
            token,
            proxy,
            ..Self::default()
        }
    }

    /// Set the GitHub repository (builder).
    pub fn set_repo(mut self, repo: &str) -> Self {
        self.repo = repo.to_owned();
        self
    }

    /// Point API requests at a different host (builder).
    pub fn set_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_owned();
        self
    }

    /// Set or clear the bearer token (builder).
    pub fn set_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Set an explicit HTTP/HTTPS proxy URL (builder).
    pub fn set_proxy(mut self, proxy: &str) -> Self {
        self.proxy = Some(proxy.to_owned());
        self
    }

    /// All ABI labels, in configuration order.
    pub fn abis(&self) -> impl Iterator<Item = &str> {
        self.abi_map.iter().map(|(_, abi)| abi.as_str())
    }

    /// Asset keywords, in configuration order.
    pub fn keywords(&self) -> Vec<String> {
        self.abi_map.iter().map(|(kw, _)| kw.clone()).collect()
    }

    /// URL of the release document for `tag`, or the latest release.
    pub fn release_url(&self, tag: Option<&str>) -> String {
        match tag {
            Some(tag) => format!("{}/repos/{}/releases/tags/{tag}", self.api_base, self.repo),
            None => format!("{}/repos/{}/releases/latest", self.api_base, self.repo),
        }
    }

    pub fn resource_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.resource_dir)
    }

    /// Native-library dir for one ABI.
    pub fn library_dir(&self, project_root: &Path, abi: &str) -> PathBuf {
        project_root.join(&self.jni_libs_dir).join(abi)
    }

    pub fn cache_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.cache_dir)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}
