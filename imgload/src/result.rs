//! Load results.

use bytes::Bytes;
use image::RgbaImage;
use std::fmt;
use std::sync::Arc;

/// Where a result was obtained from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadedFrom {
    Memory,
    Disk,
    Network,
}

impl fmt::Display for LoadedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Memory => "MEMORY",
            Self::Disk => "DISK",
            Self::Network => "NETWORK",
        };
        f.write_str(name)
    }
}

/// A decoded RGBA raster, shared by reference.
#[derive(Clone, PartialEq)]
pub struct Bitmap(Arc<RgbaImage>);

impl Bitmap {
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Bytes of pixel storage; this is what the memory cache budgets.
    pub fn byte_count(&self) -> usize {
        self.0.as_raw().len()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0
    }

    /// Whether two handles share the same pixel buffer.
    pub fn ptr_eq(&self, other: &Bitmap) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// Outcome of a successful load.
#[derive(Debug, Clone)]
pub enum LoadResult {
    /// Decoded raster; eligible for the memory cache.
    Bitmap {
        bitmap: Bitmap,
        loaded_from: LoadedFrom,
        exif_rotation: u32,
    },
    /// Undecoded payload (vector formats and other non-raster content).
    Drawable {
        data: Bytes,
        loaded_from: LoadedFrom,
        exif_rotation: u32,
    },
}

impl LoadResult {
    pub fn bitmap(bitmap: Bitmap, loaded_from: LoadedFrom) -> Self {
        Self::Bitmap {
            bitmap,
            loaded_from,
            exif_rotation: 0,
        }
    }

    pub fn drawable(data: Bytes, loaded_from: LoadedFrom) -> Self {
        Self::Drawable {
            data,
            loaded_from,
            exif_rotation: 0,
        }
    }

    pub fn loaded_from(&self) -> LoadedFrom {
        match self {
            Self::Bitmap { loaded_from, .. } | Self::Drawable { loaded_from, .. } => *loaded_from,
        }
    }

    pub fn exif_rotation(&self) -> u32 {
        match self {
            Self::Bitmap { exif_rotation, .. } | Self::Drawable { exif_rotation, .. } => {
                *exif_rotation
            }
        }
    }

    pub fn as_bitmap(&self) -> Option<&Bitmap> {
        match self {
            Self::Bitmap { bitmap, .. } => Some(bitmap),
            Self::Drawable { .. } => None,
        }
    }
}
