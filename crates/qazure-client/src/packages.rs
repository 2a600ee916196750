//! Provider client packages.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rustc_hash::FxHashSet;
use tracing::info;

use qazure_hal::{HalError, HalResult};

/// Loads the client package a provider needs before its targets are used.
#[async_trait]
pub trait PackageLoader: Send + Sync {
    /// Whether `package` is already loaded.
    fn is_loaded(&self, package: &str) -> bool;

    /// Load `package` and its dependencies.
    async fn ensure_loaded(&self, package: &str) -> HalResult<()>;
}

/// Tracks loaded packages in memory.
///
/// Packages listed as unavailable fail to load.
#[derive(Debug, Default)]
pub struct InMemoryPackageLoader {
    loaded: Mutex<FxHashSet<String>>,
    unavailable: FxHashSet<String>,
}

impl InMemoryPackageLoader {
    /// Loader with nothing loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader for which `packages` cannot be loaded.
    pub fn with_unavailable<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            loaded: Mutex::new(FxHashSet::default()),
            unavailable: packages.into_iter().map(Into::into).collect(),
        }
    }

    /// Loaded packages, sorted.
    pub fn loaded(&self) -> Vec<String> {
        let mut loaded: Vec<String> = self
            .loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        loaded.sort();
        loaded
    }
}

#[async_trait]
impl PackageLoader for InMemoryPackageLoader {
    fn is_loaded(&self, package: &str) -> bool {
        self.loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(package)
    }

    async fn ensure_loaded(&self, package: &str) -> HalResult<()> {
        if self.unavailable.contains(package) {
            return Err(HalError::Backend(format!("Package {package} could not be loaded")));
        }
        let inserted = self
            .loaded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(package.to_string());
        if inserted {
            info!(package, "package loaded");
        }
        Ok(())
    }
}
