//! Chartwright Core - building blocks of the chart release pipeline
//!
//! This crate provides the pieces that need no network access:
//! - `BuildStrategy`: the closed set of image build strategies
//! - `Platform`: target platforms and their generated manifest locations
//! - `LazyHandle`: race-tolerant lazy construction of expensive collaborators
//! - `ChartMeta`: chart metadata and `Chart.yaml` rendering
//! - `ChartPackager`: turns generated manifests into a `ChartArtifact`

pub mod archive;
pub mod chart;
pub mod error;
pub mod lazy;
pub mod packager;
pub mod platform;
pub mod strategy;

pub use archive::{ChartArtifact, build_archive, compute_digest, list_entries, read_entry};
pub use chart::{ChartFile, ChartMeta, Maintainer, is_snapshot_version};
pub use error::{CoreError, Result};
pub use lazy::LazyHandle;
pub use packager::{ChartPackager, DiskManifests, ManifestFile, ManifestSource};
pub use platform::{ManifestLocation, Platform};
pub use strategy::{BuildStrategy, SourceStrategyKey};
