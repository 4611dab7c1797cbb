//! Pure image transform: decode, optional crop, quarter-turn rotation,
//! re-encode. Runs synchronously inside `update`; the shell only ever sees
//! the finished payload.
//!
//! The crop region arrives in the rotated image's pixel space, so rotation is
//! applied first and the region is clamped against the rotated bounds.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::model::MediaPayload;

/// Decode guards. A hostile payload should fail fast, not allocate.
const MAX_DECODE_DIMENSION: u32 = 8_192;
const MAX_DECODE_ALLOC: u64 = 256 * 1024 * 1024;

/// Formats we can write back out. Anything else re-encodes as JPEG.
const ENCODABLE_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Gif,
];

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("image input is empty")]
    EmptyInput,
    #[error("image input is {size} bytes, larger than the {max} byte limit")]
    InputTooLarge { size: usize, max: usize },
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("unrecognized image format")]
    UnsupportedFormat,
    #[error("crop region has zero width or height")]
    InvalidRegion,
    #[error("crop region lies outside the image")]
    ZeroCrop,
    #[error("failed to encode {format:?} output: {reason}")]
    Encode { format: ImageFormat, reason: String },
}

/// Axis-aligned crop rectangle in the rotated image's pixel space.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl CropRegion {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Result<Self, TransformError> {
        if width == 0 || height == 0 {
            return Err(TransformError::InvalidRegion);
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    #[must_use]
    pub fn x(&self) -> u32 {
        self.x
    }

    #[must_use]
    pub fn y(&self) -> u32 {
        self.y
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Quarter-turn rotation. The capture UI only ever produces multiples of
/// ninety degrees, so the rotated bounding box is an exact dimension swap.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    None,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Accepts any multiple of 90, normalized into [0, 360).
    #[must_use]
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Rotation::None),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    #[must_use]
    pub fn degrees(self) -> u32 {
        match self {
            Rotation::None => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    #[must_use]
    pub fn is_identity(self) -> bool {
        self == Rotation::None
    }
}

/// Dimensions of the rotated image for a given source size.
#[must_use]
pub fn bounded_dimensions(width: u32, height: u32, rotation: Rotation) -> (u32, u32) {
    match rotation {
        Rotation::None | Rotation::Deg180 => (width, height),
        Rotation::Deg90 | Rotation::Deg270 => (height, width),
    }
}

/// Rotate and crop an encoded image, re-encoding in the source format where
/// possible. `region: None` keeps the full (rotated) frame.
pub fn crop(
    raw: &[u8],
    region: Option<CropRegion>,
    rotation: Rotation,
) -> Result<MediaPayload, TransformError> {
    let (decoded, detected) = decode_image(raw)?;

    let rotated = apply_rotation(decoded, rotation);
    let cropped = match region {
        Some(region) => extract_region(&rotated, region)?,
        None => rotated,
    };

    let format = detected
        .filter(|f| ENCODABLE_FORMATS.contains(f))
        .unwrap_or(ImageFormat::Jpeg);
    encode(&cropped, format)
}

/// Decode with explicit limits so oversized or dimension-bomb inputs are
/// rejected before any pixel buffer is allocated.
fn decode_image(raw: &[u8]) -> Result<(DynamicImage, Option<ImageFormat>), TransformError> {
    if raw.is_empty() {
        return Err(TransformError::EmptyInput);
    }
    let max_input = usize::try_from(MAX_DECODE_ALLOC).unwrap_or(usize::MAX);
    if raw.len() > max_input {
        return Err(TransformError::InputTooLarge {
            size: raw.len(),
            max: max_input,
        });
    }

    let mut reader = image::ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(|_| TransformError::UnsupportedFormat)?;

    let mut limits = image::Limits::default();
    limits.max_image_width = Some(MAX_DECODE_DIMENSION);
    limits.max_image_height = Some(MAX_DECODE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    reader.limits(limits);

    let detected = reader.format();
    let decoded = reader.decode()?;
    debug!(
        width = decoded.width(),
        height = decoded.height(),
        format = ?detected,
        "decoded image for transform"
    );
    Ok((decoded, detected))
}

fn apply_rotation(image: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::None => image,
        Rotation::Deg90 => image.rotate90(),
        Rotation::Deg180 => image.rotate180(),
        Rotation::Deg270 => image.rotate270(),
    }
}

/// Clamp the region into the image bounds, then crop. A region entirely
/// outside the image is an error rather than an empty payload.
fn extract_region(image: &DynamicImage, region: CropRegion) -> Result<DynamicImage, TransformError> {
    let (img_w, img_h) = image.dimensions();

    let x = region.x.min(img_w);
    let y = region.y.min(img_h);
    let width = region.width.min(img_w - x);
    let height = region.height.min(img_h - y);

    if width == 0 || height == 0 {
        warn!(
            x = region.x,
            y = region.y,
            img_w,
            img_h,
            "crop region clamped to nothing"
        );
        return Err(TransformError::ZeroCrop);
    }

    Ok(image.crop_imm(x, y, width, height))
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<MediaPayload, TransformError> {
    // JPEG has no alpha channel; flatten first.
    let image = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(image.to_rgb8())
    } else {
        image.clone()
    };

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, format)
        .map_err(|e| TransformError::Encode {
            format,
            reason: e.to_string(),
        })?;

    Ok(MediaPayload::new(format.to_mime_type(), out.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::png::PngEncoder;
    use image::{ExtendedColorType, ImageEncoder};
    use proptest::prelude::*;

    /// A small PNG with a deterministic per-pixel pattern so rotations and
    /// crops are distinguishable.
    fn test_png(width: u32, height: u32) -> Vec<u8> {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 0, 255]);
            }
        }
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(&pixels, width, height, ExtendedColorType::Rgba8)
            .unwrap();
        out
    }

    fn decode(payload: &MediaPayload) -> DynamicImage {
        image::load_from_memory(&payload.data).unwrap()
    }

    #[test]
    fn full_frame_no_rotation_preserves_pixels() {
        let raw = test_png(8, 5);
        let result = crop(&raw, None, Rotation::None).unwrap();
        assert_eq!(result.mime_type, "image/png");

        let original = image::load_from_memory(&raw).unwrap();
        let roundtrip = decode(&result);
        assert_eq!(roundtrip.dimensions(), (8, 5));
        assert_eq!(original.to_rgba8(), roundtrip.to_rgba8());
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        let raw = test_png(8, 5);
        let rotated = crop(&raw, None, Rotation::Deg90).unwrap();
        assert_eq!(decode(&rotated).dimensions(), (5, 8));

        let rotated = crop(&raw, None, Rotation::Deg180).unwrap();
        assert_eq!(decode(&rotated).dimensions(), (8, 5));
    }

    #[test]
    fn rotate_90_then_270_round_trips() {
        let raw = test_png(7, 4);
        let once = crop(&raw, None, Rotation::Deg90).unwrap();
        let back = crop(&once.data, None, Rotation::Deg270).unwrap();
        assert_eq!(
            image::load_from_memory(&raw).unwrap().to_rgba8(),
            decode(&back).to_rgba8()
        );
    }

    #[test]
    fn region_crop_in_rotated_space_round_trips() {
        // rotate90 maps source (x, y) to (h - 1 - y, x), so a region
        // (rx, ry, rw, rh) in rotated space covers (ry, h - rx - rw, rh, rw)
        // in the source. Cropping in rotated space and rotating back must
        // give the same pixels as cropping the mapped region directly.
        let (w, h) = (8u32, 5u32);
        let raw = test_png(w, h);

        let (rx, ry, rw, rh) = (1u32, 2u32, 2u32, 3u32);
        let rotated_region = CropRegion::new(rx, ry, rw, rh).unwrap();
        let cropped = crop(&raw, Some(rotated_region), Rotation::Deg90).unwrap();
        let restored = crop(&cropped.data, None, Rotation::Deg270).unwrap();

        let mapped_back = CropRegion::new(ry, h - rx - rw, rh, rw).unwrap();
        let direct = crop(&raw, Some(mapped_back), Rotation::None).unwrap();

        assert_eq!(decode(&restored).dimensions(), (rh, rw));
        assert_eq!(decode(&restored).to_rgba8(), decode(&direct).to_rgba8());
    }

    #[test]
    fn region_is_interpreted_in_rotated_space() {
        // 8x5 source rotated 90 degrees is 5x8; a 5x8 region fills it.
        let raw = test_png(8, 5);
        let region = CropRegion::new(0, 0, 5, 8).unwrap();
        let result = crop(&raw, Some(region), Rotation::Deg90).unwrap();
        assert_eq!(decode(&result).dimensions(), (5, 8));
    }

    #[test]
    fn region_crops_expected_pixels() {
        let raw = test_png(8, 5);
        let region = CropRegion::new(2, 1, 3, 2).unwrap();
        let result = crop(&raw, Some(region), Rotation::None).unwrap();
        let cropped = decode(&result).to_rgba8();
        assert_eq!(cropped.dimensions(), (3, 2));
        // top-left of the crop is source pixel (2, 1)
        assert_eq!(cropped.get_pixel(0, 0).0, [2, 1, 0, 255]);
        assert_eq!(cropped.get_pixel(2, 1).0, [4, 2, 0, 255]);
    }

    #[test]
    fn oversized_region_is_clamped_to_bounds() {
        let raw = test_png(8, 5);
        let region = CropRegion::new(6, 3, 100, 100).unwrap();
        let result = crop(&raw, Some(region), Rotation::None).unwrap();
        assert_eq!(decode(&result).dimensions(), (2, 2));
    }

    #[test]
    fn region_outside_image_is_zero_crop() {
        let raw = test_png(8, 5);
        let region = CropRegion::new(50, 50, 2, 2).unwrap();
        assert!(matches!(
            crop(&raw, Some(region), Rotation::None),
            Err(TransformError::ZeroCrop)
        ));
    }

    #[test]
    fn zero_sized_region_is_rejected_at_construction() {
        assert!(matches!(
            CropRegion::new(0, 0, 0, 5),
            Err(TransformError::InvalidRegion)
        ));
        assert!(matches!(
            CropRegion::new(0, 0, 5, 0),
            Err(TransformError::InvalidRegion)
        ));
    }

    #[test]
    fn garbage_input_fails_to_decode() {
        let result = crop(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01], None, Rotation::None);
        assert!(matches!(
            result,
            Err(TransformError::Decode(_) | TransformError::UnsupportedFormat)
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            crop(&[], None, Rotation::None),
            Err(TransformError::EmptyInput)
        ));
    }

    #[test]
    fn rotation_parses_normalized_degrees() {
        assert_eq!(Rotation::from_degrees(0), Some(Rotation::None));
        assert_eq!(Rotation::from_degrees(90), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    proptest! {
        #[test]
        fn clamped_crop_never_exceeds_bounds(
            w in 1u32..64, h in 1u32..64,
            x in 0u32..128, y in 0u32..128,
            rw in 1u32..128, rh in 1u32..128,
        ) {
            let raw = test_png(w, h);
            let region = CropRegion::new(x, y, rw, rh).unwrap();
            if let Ok(payload) = crop(&raw, Some(region), Rotation::None) {
                let (cw, ch) = decode(&payload).dimensions();
                prop_assert!(cw <= w && ch <= h);
                prop_assert!(cw > 0 && ch > 0);
            }
        }

        #[test]
        fn bounded_dimensions_matches_quarter_turn_geometry(
            w in 1u32..10_000, h in 1u32..10_000,
        ) {
            prop_assert_eq!(bounded_dimensions(w, h, Rotation::None), (w, h));
            prop_assert_eq!(bounded_dimensions(w, h, Rotation::Deg180), (w, h));
            prop_assert_eq!(bounded_dimensions(w, h, Rotation::Deg90), (h, w));
            prop_assert_eq!(bounded_dimensions(w, h, Rotation::Deg270), (h, w));
        }
    }
}
