//! Bundled asset strategy.

use super::decode::decode_blocking;
use super::{LoadFuture, LoadStrategy};
use crate::error::LoadError;
use crate::request::{Request, Source};
use crate::result::LoadedFrom;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};

const ASSET_PREFIX: &str = "asset:///";

/// Loads `asset:///<relative path>` sources from an asset directory.
#[derive(Debug, Clone)]
pub struct AssetStrategy {
    root: PathBuf,
}

impl AssetStrategy {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative_path(request: &Request) -> Option<&str> {
        match request.source() {
            Source::Uri(uri) => uri.strip_prefix(ASSET_PREFIX),
            Source::Resource(_) => None,
        }
    }

    /// Resolves an asset path, refusing anything that leaves the root.
    fn resolve(&self, relative: &str) -> Result<PathBuf, LoadError> {
        let relative = Path::new(relative);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(LoadError::Io(format!(
                "invalid asset path '{}'",
                relative.display()
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl LoadStrategy for AssetStrategy {
    fn name(&self) -> &str {
        "asset"
    }

    fn can_handle(&self, request: &Request) -> bool {
        Self::relative_path(request).is_some()
    }

    fn load<'a>(&'a self, request: &'a Request) -> LoadFuture<'a> {
        Box::pin(async move {
            let relative = Self::relative_path(request)
                .ok_or_else(|| LoadError::NoStrategy(request.source().to_string()))?;
            let path = self.resolve(relative)?;

            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| LoadError::Io(format!("{}: {}", path.display(), e)))?;

            decode_blocking(Bytes::from(bytes), request, LoadedFrom::Disk).await
        })
    }
}
