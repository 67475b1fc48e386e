//! Container image build strategies
//!
//! The set of strategies is closed. Each one carries a display label and
//! whether it supports watch mode (rebuilding on source changes).
//! Chartwright never runs a build itself; it only picks the strategy and
//! lets callers react to its capabilities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Image build strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStrategy {
    /// Source-to-image build with a binary source
    S2i,
    /// Daemonless Jib build
    Jib,
    /// Docker build with a binary source
    Docker,
    /// Cloud Native Buildpacks
    Buildpacks,
}

impl BuildStrategy {
    /// Every known strategy, in declaration order
    pub const ALL: [BuildStrategy; 4] = [
        BuildStrategy::S2i,
        BuildStrategy::Jib,
        BuildStrategy::Docker,
        BuildStrategy::Buildpacks,
    ];

    /// Display label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            BuildStrategy::S2i => "S2I",
            BuildStrategy::Jib => "Jib",
            BuildStrategy::Docker => "Docker",
            BuildStrategy::Buildpacks => "Buildpacks",
        }
    }

    #[must_use]
    pub const fn supports_watch(self) -> bool {
        match self {
            BuildStrategy::S2i | BuildStrategy::Jib | BuildStrategy::Docker => true,
            BuildStrategy::Buildpacks => false,
        }
    }

    /// Classify a cluster-side build source type (`spec.strategy.type` of a BuildConfig)
    ///
    /// Only `source` and `docker` are recognized, case-insensitively. Anything
    /// else, including an empty or absent hint, is not a match: the caller
    /// falls back to its own default.
    #[must_use]
    pub fn from_source_type(hint: Option<&str>) -> Option<Self> {
        let hint = hint?;
        if hint.eq_ignore_ascii_case("source") {
            Some(BuildStrategy::S2i)
        } else if hint.eq_ignore_ascii_case("docker") {
            Some(BuildStrategy::Docker)
        } else {
            None
        }
    }

    /// Check whether a source type hint designates this strategy
    #[must_use]
    pub fn is_same(self, source_type: Option<&str>) -> bool {
        Self::from_source_type(source_type) == Some(self)
    }
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BuildStrategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::UnknownStrategy {
                name: s.to_string(),
            })
    }
}

/// Keys extracted from a `fromExt` source strategy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceStrategyKey {
    Kind,
    Namespace,
    Name,
}

impl SourceStrategyKey {
    pub const ALL: [SourceStrategyKey; 3] = [
        SourceStrategyKey::Kind,
        SourceStrategyKey::Namespace,
        SourceStrategyKey::Name,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            SourceStrategyKey::Kind => "kind",
            SourceStrategyKey::Namespace => "namespace",
            SourceStrategyKey::Name => "name",
        }
    }
}
