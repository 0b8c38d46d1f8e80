//! Shared image decoding for the built-in strategies.
//!
//! Decoding is CPU-bound and must run on a blocking thread; strategies call
//! [`decode_bytes`] through `tokio::task::spawn_blocking`.

use crate::error::LoadError;
use crate::request::{Gravity, Request};
use crate::result::{Bitmap, LoadResult, LoadedFrom};
use bytes::Bytes;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use tracing::debug;

const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Rotation in degrees encoded by an EXIF orientation.
///
/// Mirrored orientations report the rotation component only.
pub fn orientation_degrees(orientation: Orientation) -> u32 {
    match orientation {
        Orientation::Rotate90 | Orientation::Rotate90FlipH => 90,
        Orientation::Rotate180 | Orientation::FlipVertical => 180,
        Orientation::Rotate270 | Orientation::Rotate270FlipH => 270,
        Orientation::NoTransforms | Orientation::FlipHorizontal => 0,
    }
}

/// Decodes raw bytes into a load result for `request`.
///
/// Raster formats known to the decoder become a [`LoadResult::Bitmap`] with
/// orientation and the request's resize and rotation applied. Anything the
/// decoder does not recognise (SVG and other vector payloads) is passed
/// through untouched as a [`LoadResult::Drawable`].
pub fn decode_bytes(
    bytes: Bytes,
    request: &Request,
    loaded_from: LoadedFrom,
) -> Result<LoadResult, LoadError> {
    let reader = ImageReader::new(Cursor::new(bytes.clone())).with_guessed_format()?;

    if reader.format().is_none() {
        debug!(
            log_id = %request.log_id(),
            bytes = bytes.len(),
            "Unrecognised raster format, returning drawable"
        );
        return Ok(LoadResult::drawable(bytes, loaded_from));
    }

    let mut decoder = reader.into_decoder()?;
    let orientation = decoder
        .orientation()
        .unwrap_or(Orientation::NoTransforms);
    let image = DynamicImage::from_decoder(decoder)?;

    let exif_rotation = orientation_degrees(orientation);
    let image = apply_orientation(image, orientation);
    let image = apply_request_transforms(image, request);

    Ok(LoadResult::Bitmap {
        bitmap: Bitmap::new(image.into_rgba8()),
        loaded_from,
        exif_rotation,
    })
}

/// Runs [`decode_bytes`] on the blocking thread pool.
pub(crate) async fn decode_blocking(
    bytes: Bytes,
    request: &Request,
    loaded_from: LoadedFrom,
) -> Result<LoadResult, LoadError> {
    let request = request.clone();
    tokio::task::spawn_blocking(move || decode_bytes(bytes, &request, loaded_from))
        .await
        .map_err(|e| LoadError::Decode(format!("decode task failed: {}", e)))?
}

fn apply_orientation(image: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::NoTransforms => image,
        Orientation::Rotate90 => image.rotate90(),
        Orientation::Rotate180 => image.rotate180(),
        Orientation::Rotate270 => image.rotate270(),
        Orientation::FlipHorizontal => image.fliph(),
        Orientation::FlipVertical => image.flipv(),
        Orientation::Rotate90FlipH => image.rotate90().fliph(),
        Orientation::Rotate270FlipH => image.rotate270().fliph(),
    }
}

fn apply_request_transforms(mut image: DynamicImage, request: &Request) -> DynamicImage {
    if let Some((width, height)) = request.resize() {
        image = resize(image, request, width, height);
    }

    let degrees = request.rotation_degrees();
    if degrees != 0.0 {
        image = match normalized_quarter_turns(degrees) {
            Some(1) => image.rotate90(),
            Some(2) => image.rotate180(),
            Some(3) => image.rotate270(),
            Some(_) => image,
            None => {
                debug!(
                    log_id = %request.log_id(),
                    degrees,
                    "Rotation is not a multiple of 90 degrees, skipped"
                );
                image
            }
        };
    }

    image
}

fn normalized_quarter_turns(degrees: f32) -> Option<u32> {
    let turns = degrees / 90.0;
    if turns.fract() != 0.0 {
        return None;
    }
    Some((turns as i64).rem_euclid(4) as u32)
}

fn resize(image: DynamicImage, request: &Request, width: u32, height: u32) -> DynamicImage {
    let (source_w, source_h) = (image.width(), image.height());
    if source_w == 0 || source_h == 0 {
        return image;
    }

    // Zero in one dimension preserves aspect ratio
    let (width, height) = match (width, height) {
        (0, h) => ((source_w as u64 * h as u64 / source_h as u64).max(1) as u32, h),
        (w, 0) => (w, (source_h as u64 * w as u64 / source_w as u64).max(1) as u32),
        dims => dims,
    };

    if request.only_scale_down() && source_w <= width && source_h <= height {
        return image;
    }

    if request.center_crop() {
        crop_to_fill(image, width, height, request.center_crop_gravity())
    } else if request.center_inside() {
        image.resize(width, height, RESIZE_FILTER)
    } else {
        image.resize_exact(width, height, RESIZE_FILTER)
    }
}

/// Scales to cover the target box and crops the overflow at `gravity`.
fn crop_to_fill(image: DynamicImage, width: u32, height: u32, gravity: Gravity) -> DynamicImage {
    let scaled = scale_to_cover(&image, width, height);
    let (scaled_w, scaled_h) = (scaled.width(), scaled.height());

    let x = match gravity {
        Gravity::Left => 0,
        Gravity::Right => scaled_w.saturating_sub(width),
        _ => scaled_w.saturating_sub(width) / 2,
    };
    let y = match gravity {
        Gravity::Top => 0,
        Gravity::Bottom => scaled_h.saturating_sub(height),
        _ => scaled_h.saturating_sub(height) / 2,
    };

    scaled.crop_imm(x, y, width.min(scaled_w), height.min(scaled_h))
}

/// Resizes preserving aspect ratio so both sides cover the box.
fn scale_to_cover(image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let scale_w = width as f64 / image.width() as f64;
    let scale_h = height as f64 / image.height() as f64;
    let scale = scale_w.max(scale_h);
    let new_w = ((image.width() as f64 * scale).round() as u32).max(width);
    let new_h = ((image.height() as f64 * scale).round() as u32).max(height);
    image.resize_exact(new_w, new_h, RESIZE_FILTER)
}
