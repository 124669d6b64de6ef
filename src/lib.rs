//! # maafetch
//!
//! Downloads prebuilt MAA Core archives from a GitHub release and deploys
//! them into an Android project: resource files into the assets tree,
//! shared libraries into the per-ABI `jniLibs` dirs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use maafetch::{AbiFilter, Api, DeployConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     Api::new(DeployConfig::from_env())
//!         .set_project_root(".")
//!         .abi(AbiFilter::Only("arm64-v8a".to_owned()))
//!         .tag("v6.3.0")
//!         .deploy()
//!         .await
//!         .unwrap();
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod deploy;
pub mod downloader;
pub mod error;
pub mod progress;
pub mod release;
pub mod select;

pub use api::{Api, DeployedArchive, RunReport};
pub use config::DeployConfig;
pub use deploy::{DeployStats, DeploySummary, Deployer};
pub use downloader::{CacheStatus, Downloader};
pub use error::{Error, Result};
pub use release::{Asset, Release};
pub use select::AbiFilter;
