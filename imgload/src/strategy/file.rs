//! Local file strategy.

use super::decode::decode_blocking;
use super::{LoadFuture, LoadStrategy};
use crate::error::LoadError;
use crate::request::{Request, Source};
use crate::result::LoadedFrom;
use bytes::Bytes;
use std::path::PathBuf;
use tracing::trace;

const FILE_SCHEME: &str = "file://";

/// Loads images from the local filesystem.
///
/// Accepts `file://` URIs and bare absolute paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStrategy;

impl FileStrategy {
    pub fn new() -> Self {
        Self
    }

    fn path_for(request: &Request) -> Option<PathBuf> {
        match request.source() {
            Source::Uri(uri) => {
                if let Some(path) = uri.strip_prefix(FILE_SCHEME) {
                    Some(PathBuf::from(path))
                } else if uri.starts_with('/') {
                    Some(PathBuf::from(uri))
                } else {
                    None
                }
            }
            Source::Resource(_) => None,
        }
    }
}

impl LoadStrategy for FileStrategy {
    fn name(&self) -> &str {
        "file"
    }

    fn can_handle(&self, request: &Request) -> bool {
        Self::path_for(request).is_some()
    }

    fn load<'a>(&'a self, request: &'a Request) -> LoadFuture<'a> {
        Box::pin(async move {
            let path = Self::path_for(request)
                .ok_or_else(|| LoadError::NoStrategy(request.source().to_string()))?;

            trace!(path = %path.display(), "Reading image file");
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| LoadError::Io(format!("{}: {}", path.display(), e)))?;

            decode_blocking(Bytes::from(bytes), request, LoadedFrom::Disk).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbaImage};
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        DynamicImage::ImageRgba8(RgbaImage::new(3, 2))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn test_can_handle() {
        let strategy = FileStrategy::new();
        assert!(strategy.can_handle(&Request::uri("file:///tmp/a.png").build().unwrap()));
        assert!(strategy.can_handle(&Request::uri("/tmp/a.png").build().unwrap()));
        assert!(!strategy.can_handle(&Request::uri("https://x/a.png").build().unwrap()));
        assert!(!strategy.can_handle(&Request::resource(7).build().unwrap()));
    }

    #[tokio::test]
    async fn test_load_png_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "a.png");
        let request = Request::file(&path).build().unwrap();

        let result = FileStrategy::new().load(&request).await.unwrap();

        assert_eq!(result.loaded_from(), LoadedFrom::Disk);
        let bitmap = result.as_bitmap().unwrap();
        assert_eq!((bitmap.width(), bitmap.height()), (3, 2));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let request = Request::file(dir.path().join("missing.png"))
            .build()
            .unwrap();

        let err = FileStrategy::new().load(&request).await.unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[test]
    fn test_no_retries() {
        let strategy = FileStrategy::new();
        assert_eq!(strategy.retry_count(), 0);
        assert!(!strategy.supports_replay());
    }
}
