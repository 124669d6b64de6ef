/// End-to-end tests against a fake release API served on localhost.
///
/// The real-GitHub test makes network requests and downloads large files.
/// Run with `cargo test -- --include-ignored` to include it.
#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use axum::http::{header, HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use maafetch::progress::ProgressFn;
    use maafetch::{
        AbiFilter, Api, Asset, CacheStatus, DeployConfig, DeployStats, Downloader, Error,
    };
    use walkdir::WalkDir;

    const REPO: &str = "owner/repo";
    const ARM_ASSET: &str = "android-arm64-v1.tar.gz";

    fn build_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn scenario_archive() -> Vec<u8> {
        build_archive(&[
            ("libfoo/resource/config.json", b"{\"k\":1}"),
            ("libfoo/libbar.so", b"\x7fELF"),
            ("libfoo/libbar.h", b"#pragma once"),
        ])
    }

    type SeenHeaders = Arc<Mutex<Vec<Option<String>>>>;

    struct FakeServer {
        base: String,
        api_hits: Arc<AtomicUsize>,
        download_hits: Arc<AtomicUsize>,
        /// `Authorization` header of every API request, in order.
        api_auth: SeenHeaders,
        /// `Authorization` header of every download request, in order.
        download_auth: SeenHeaders,
    }

    fn record_auth(seen: &SeenHeaders, headers: &HeaderMap) {
        let value = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        seen.lock().unwrap().push(value);
    }

    /// Serve one release with a single arm64 asset; `None` makes the API return 404.
    async fn serve(archive: Option<Vec<u8>>) -> FakeServer {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let api_hits = Arc::new(AtomicUsize::new(0));
        let download_hits = Arc::new(AtomicUsize::new(0));
        let api_auth: SeenHeaders = Arc::default();
        let download_auth: SeenHeaders = Arc::default();

        let release = archive.as_ref().map(|bytes| {
            serde_json::json!({
                "tag_name": "v1",
                "assets": [
                    {
                        "name": ARM_ASSET,
                        "browser_download_url": format!("{base}/download/{ARM_ASSET}"),
                        "size": bytes.len(),
                    },
                    {
                        "name": "MAA-v1-win-x64.zip",
                        "browser_download_url": format!("{base}/download/MAA-v1-win-x64.zip"),
                        "size": 3,
                    }
                ]
            })
            .to_string()
        });
        let body = archive.unwrap_or_default();

        let app = Router::new()
            .route(
                &format!("/repos/{REPO}/releases/latest"),
                get({
                    let hits = api_hits.clone();
                    let seen = api_auth.clone();
                    move |headers: HeaderMap| {
                        let hits = hits.clone();
                        let release = release.clone();
                        record_auth(&seen, &headers);
                        async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            match release {
                                Some(json) => (StatusCode::OK, json),
                                None => (StatusCode::NOT_FOUND, "Not Found".to_owned()),
                            }
                        }
                    }
                }),
            )
            .route(
                &format!("/download/{ARM_ASSET}"),
                get({
                    let hits = download_hits.clone();
                    let seen = download_auth.clone();
                    move |headers: HeaderMap| {
                        let hits = hits.clone();
                        let body = body.clone();
                        record_auth(&seen, &headers);
                        async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            body
                        }
                    }
                }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeServer {
            base,
            api_hits,
            download_hits,
            api_auth,
            download_auth,
        }
    }

    fn config(server: &FakeServer) -> DeployConfig {
        DeployConfig::default()
            .set_repo(REPO)
            .set_api_base(&server.base)
            .set_token(None)
    }

    /// Relative path -> contents for every file below `root`.
    fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<_> = WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().display().to_string();
                (rel, std::fs::read(e.path()).unwrap())
            })
            .collect();
        files.sort();
        files
    }

    #[tokio::test]
    async fn test_deploy_latest_release() {
        let server = serve(Some(scenario_archive())).await;
        let project = tempfile::tempdir().unwrap();
        let config = config(&server);

        let report = Api::new(config.clone())
            .set_project_root(project.path())
            .no_progress()
            .latest()
            .deploy()
            .await
            .expect("deploy latest");

        assert_eq!(report.tag.as_deref(), Some("v1"));
        assert_eq!(report.archives.len(), 1);
        assert_eq!(report.archives[0].abi, "arm64-v8a");
        assert_eq!(report.archives[0].cache, Some(CacheStatus::Downloaded));
        assert_eq!(
            report.archives[0].stats,
            DeployStats {
                resource: 1,
                libraries: 1,
                skipped: 1
            }
        );

        let resource = config.resource_root(project.path()).join("config.json");
        assert_eq!(std::fs::read(resource).unwrap(), b"{\"k\":1}");
        let lib_dir = config.library_dir(project.path(), "arm64-v8a");
        assert_eq!(std::fs::read(lib_dir.join("libbar.so")).unwrap(), b"\x7fELF");
        assert!(!lib_dir.join("libbar.h").exists());
        assert_eq!(
            report.summary.libraries,
            [("arm64-v8a".to_owned(), vec!["libbar.so".to_owned()])]
        );
        assert!(config.cache_root(project.path()).join(ARM_ASSET).exists());
        assert_eq!(server.api_hits.load(Ordering::SeqCst), 1);
        assert_eq!(server.download_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_asset_is_not_downloaded_again() {
        let server = serve(Some(scenario_archive())).await;
        let project = tempfile::tempdir().unwrap();
        let config = config(&server);

        for _ in 0..2 {
            Api::new(config.clone())
                .set_project_root(project.path())
                .no_progress()
                .latest()
                .deploy()
                .await
                .expect("deploy");
        }

        assert_eq!(server.api_hits.load(Ordering::SeqCst), 2);
        assert_eq!(server.download_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_truncated_cache_file_is_replaced() {
        let archive = scenario_archive();
        let server = serve(Some(archive.clone())).await;
        let project = tempfile::tempdir().unwrap();
        let config = config(&server);

        let cache_dir = config.cache_root(project.path());
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join(ARM_ASSET), &archive[..archive.len() / 2]).unwrap();

        let report = Api::new(config.clone())
            .set_project_root(project.path())
            .no_progress()
            .latest()
            .deploy()
            .await
            .expect("deploy");

        assert_eq!(report.archives[0].cache, Some(CacheStatus::Downloaded));
        assert_eq!(std::fs::read(cache_dir.join(ARM_ASSET)).unwrap(), archive);
    }

    #[tokio::test]
    async fn test_skip_download_is_idempotent() {
        let server = serve(Some(scenario_archive())).await;
        let project = tempfile::tempdir().unwrap();
        let config = config(&server);

        Api::new(config.clone())
            .set_project_root(project.path())
            .no_progress()
            .latest()
            .deploy()
            .await
            .expect("initial deploy");
        let hits_before = server.api_hits.load(Ordering::SeqCst);

        let mut snapshots = Vec::new();
        for _ in 0..2 {
            let report = Api::new(config.clone())
                .set_project_root(project.path())
                .no_progress()
                .cached()
                .deploy()
                .await
                .expect("cached deploy");
            assert_eq!(report.tag, None);
            assert_eq!(report.archives[0].cache, None);
            snapshots.push(snapshot(&project.path().join("app")));
        }

        assert_eq!(snapshots[0], snapshots[1]);
        assert_eq!(server.api_hits.load(Ordering::SeqCst), hits_before);
    }

    #[tokio::test]
    async fn test_clean_preserves_protected_library() {
        let server = serve(Some(scenario_archive())).await;
        let project = tempfile::tempdir().unwrap();
        let config = config(&server);

        let lib_dir = config.library_dir(project.path(), "arm64-v8a");
        std::fs::create_dir_all(&lib_dir).unwrap();
        std::fs::write(lib_dir.join("libold.so"), b"old").unwrap();
        std::fs::write(lib_dir.join("libjnidispatch.so"), b"jna").unwrap();
        let stale = config.resource_root(project.path()).join("stale.json");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, b"stale").unwrap();

        Api::new(config.clone())
            .set_project_root(project.path())
            .clean(true)
            .no_progress()
            .latest()
            .deploy()
            .await
            .expect("clean deploy");

        assert!(!lib_dir.join("libold.so").exists());
        assert_eq!(std::fs::read(lib_dir.join("libjnidispatch.so")).unwrap(), b"jna");
        assert!(lib_dir.join("libbar.so").exists());
        assert!(!stale.exists());
    }

    #[tokio::test]
    async fn test_api_error_is_fatal() {
        let server = serve(None).await;
        let project = tempfile::tempdir().unwrap();

        let err = Api::new(config(&server))
            .set_project_root(project.path())
            .no_progress()
            .latest()
            .deploy()
            .await
            .unwrap_err();

        match err {
            Error::Http { status, .. } => assert_eq!(status.as_u16(), 404),
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_requested_abi() {
        let server = serve(Some(scenario_archive())).await;
        let project = tempfile::tempdir().unwrap();

        let err = Api::new(config(&server))
            .set_project_root(project.path())
            .abi(AbiFilter::Only("x86_64".to_owned()))
            .no_progress()
            .latest()
            .deploy()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingAbi { ref abi } if abi == "x86_64"));
        assert_eq!(server.download_hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_skip_download_with_empty_cache() {
        let project = tempfile::tempdir().unwrap();

        let err = Api::new(DeployConfig::default())
            .set_project_root(project.path())
            .no_progress()
            .cached()
            .deploy()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EmptyCache { .. }));
    }

    #[tokio::test]
    async fn test_skip_download_uses_newest_cached_version() {
        let project = tempfile::tempdir().unwrap();
        let config = DeployConfig::default();
        let cache_dir = config.cache_root(project.path());
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(
            cache_dir.join("MAA-v6.3.0-android-arm64.tar.gz"),
            build_archive(&[("pkg/lib/libMaaCore.so", b"old")]),
        )
        .unwrap();
        std::fs::write(
            cache_dir.join("MAA-v6.4.0-android-arm64.tar.gz"),
            build_archive(&[("pkg/lib/libMaaCore.so", b"new")]),
        )
        .unwrap();

        let report = Api::new(config.clone())
            .set_project_root(project.path())
            .no_progress()
            .cached()
            .deploy()
            .await
            .expect("cached deploy after upgrade");

        assert_eq!(report.archives.len(), 1);
        assert_eq!(
            report.archives[0].archive,
            cache_dir.join("MAA-v6.4.0-android-arm64.tar.gz")
        );
        let lib = config
            .library_dir(project.path(), "arm64-v8a")
            .join("libMaaCore.so");
        assert_eq!(std::fs::read(lib).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_download_writes_fixed_chunks_and_reports_progress() {
        let body: Vec<u8> = (0u8..25).collect();
        let server = serve(Some(body.clone())).await;
        let cache = tempfile::tempdir().unwrap();
        let mut config = config(&server);
        config.chunk_size = 7;

        let calls: Arc<Mutex<Vec<(u64, u64, bool)>>> = Arc::default();
        let progress: ProgressFn = {
            let calls = calls.clone();
            Arc::new(
                move |_: &str, written: u64, total: u64, _: f64, complete: bool| {
                    calls.lock().unwrap().push((written, total, complete));
                },
            )
        };

        let asset = Asset {
            name: ARM_ASSET.to_owned(),
            url: format!("{}/download/{ARM_ASSET}", server.base),
            size: body.len() as u64,
        };
        let downloader = Downloader::new(&config)
            .unwrap()
            .with_progress(Some(progress));
        let (path, status) = downloader
            .download_to_cache(&asset, cache.path())
            .await
            .expect("download");

        assert_eq!(status, CacheStatus::Downloaded);
        assert_eq!(std::fs::read(path).unwrap(), body);
        assert_eq!(
            *calls.lock().unwrap(),
            [
                (7, 25, false),
                (14, 25, false),
                (21, 25, false),
                (25, 25, true)
            ]
        );
    }

    #[tokio::test]
    async fn test_bearer_token_sent_on_api_and_download() {
        let server = serve(Some(scenario_archive())).await;
        let project = tempfile::tempdir().unwrap();

        Api::new(config(&server).set_token(Some("t".into())))
            .set_project_root(project.path())
            .no_progress()
            .latest()
            .deploy()
            .await
            .expect("deploy with token");

        let bearer = Some("Bearer t".to_owned());
        assert_eq!(*server.api_auth.lock().unwrap(), [bearer.clone()]);
        assert_eq!(*server.download_auth.lock().unwrap(), [bearer]);
    }

    #[tokio::test]
    async fn test_no_authorization_without_token() {
        let server = serve(Some(scenario_archive())).await;
        let project = tempfile::tempdir().unwrap();

        Api::new(config(&server))
            .set_project_root(project.path())
            .no_progress()
            .latest()
            .deploy()
            .await
            .expect("deploy without token");

        assert_eq!(*server.api_auth.lock().unwrap(), [None]);
        assert_eq!(*server.download_auth.lock().unwrap(), [None]);
    }

    #[tokio::test]
    #[ignore = "requires network access and downloads large files"]
    async fn test_deploy_real_latest_release() {
        let project = tempfile::tempdir().unwrap();
        let result = Api::new(DeployConfig::from_env())
            .set_project_root(project.path())
            .abi(AbiFilter::Only("arm64-v8a".to_owned()))
            .latest()
            .deploy()
            .await;

        assert!(result.is_ok(), "error deploying MAA Core: {:?}", result);
    }
}
