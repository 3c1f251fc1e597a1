use image::DynamicImage;
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::webp::{WebPEncoder, WebPQuality};
use std::io::Cursor;
use thiserror::Error;

use crate::models::{OptimizationSettings, OutputFormat};
use crate::utils::validation::normalize_mime;

/// AVIF encoding speed (1 = slowest/best, 10 = fastest). Middle ground keeps
/// request latency reasonable.
const AVIF_SPEED: u8 = 6;

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("failed to encode {1} output: {0}")]
    Encode(#[source] image::ImageError, &'static str),
}

/// Concrete codec an image is re-encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::Jpeg => "jpeg",
            TargetFormat::Png => "png",
            TargetFormat::Webp => "webp",
            TargetFormat::Avif => "avif",
        }
    }
}

/// Result of a transcode pass. `format` is `None` when the input passed
/// through unmodified (`keep` on a type with no matching codec).
#[derive(Debug)]
pub struct TranscodeOutput {
    pub bytes: Vec<u8>,
    pub format: Option<TargetFormat>,
}

/// Codec lookup for `format: keep`, consulted once per request. Types without
/// an entry (AVIF included) fall through and are not re-encoded.
pub fn target_for_mime(declared_mime: &str) -> Option<TargetFormat> {
    match normalize_mime(declared_mime).as_str() {
        "image/jpeg" => Some(TargetFormat::Jpeg),
        "image/png" => Some(TargetFormat::Png),
        "image/webp" => Some(TargetFormat::Webp),
        _ => None,
    }
}

/// Resolves the requested output format to a concrete codec.
pub fn resolve_target(format: OutputFormat, declared_mime: &str) -> Option<TargetFormat> {
    match format {
        OutputFormat::Jpeg => Some(TargetFormat::Jpeg),
        OutputFormat::Png => Some(TargetFormat::Png),
        OutputFormat::Webp => Some(TargetFormat::Webp),
        OutputFormat::Avif => Some(TargetFormat::Avif),
        OutputFormat::Keep => target_for_mime(declared_mime),
    }
}

/// Decodes `data` and re-encodes it per `settings`. Inputs with no resolvable
/// target codec pass through byte-for-byte.
pub fn transcode(
    data: &[u8],
    declared_mime: &str,
    settings: &OptimizationSettings,
) -> Result<TranscodeOutput, TranscodeError> {
    let Some(target) = resolve_target(settings.format, declared_mime) else {
        return Ok(TranscodeOutput {
            bytes: data.to_vec(),
            format: None,
        });
    };

    let img = image::load_from_memory(data).map_err(TranscodeError::Decode)?;
    let bytes = encode(&img, target, settings.quality)?;

    Ok(TranscodeOutput {
        bytes,
        format: Some(target),
    })
}

/// Percentage reduction in byte size, rounded to the nearest integer.
/// Negative when the output grew. Callers must reject empty inputs first.
pub fn compression_ratio(original_size: usize, optimized_size: usize) -> i32 {
    let original = original_size as f64;
    let optimized = optimized_size as f64;
    (((original - optimized) / original) * 100.0).round() as i32
}

fn encode(
    img: &DynamicImage,
    target: TargetFormat,
    quality: u8,
) -> Result<Vec<u8>, TranscodeError> {
    let mut out = Vec::new();
    let mut cursor = Cursor::new(&mut out);

    match target {
        TargetFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut cursor, quality))
                .map_err(|e| TranscodeError::Encode(e, "jpeg"))?;
        }
        TargetFormat::Png => {
            img.write_with_encoder(PngEncoder::new_with_quality(
                &mut cursor,
                png_compression(quality),
                FilterType::Adaptive,
            ))
            .map_err(|e| TranscodeError::Encode(e, "png"))?;
        }
        TargetFormat::Webp => {
            let rgb = to_eight_bit_rgb(img);
            rgb.write_with_encoder(WebPEncoder::new_with_quality(
                &mut cursor,
                WebPQuality::lossy(quality),
            ))
            .map_err(|e| TranscodeError::Encode(e, "webp"))?;
        }
        TargetFormat::Avif => {
            let rgb = to_eight_bit_rgb(img);
            rgb.write_with_encoder(AvifEncoder::new_with_speed_quality(
                &mut cursor,
                AVIF_SPEED,
                quality,
            ))
            .map_err(|e| TranscodeError::Encode(e, "avif"))?;
        }
    }

    Ok(out)
}

/// The WebP and AVIF encoders accept 8-bit RGB/RGBA only. Convert down from
/// 16-bit, float, and grayscale color spaces.
fn to_eight_bit_rgb(img: &DynamicImage) -> DynamicImage {
    match img.color() {
        image::ColorType::Rgb8 | image::ColorType::Rgba8 => img.clone(),
        c if c.has_alpha() => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

/// PNG is lossless; the quality slider selects compression effort instead of
/// fidelity. Lower quality asks for smaller output.
fn png_compression(quality: u8) -> CompressionType {
    if quality <= 40 {
        CompressionType::Best
    } else if quality >= 90 {
        CompressionType::Fast
    } else {
        CompressionType::Default
    }
}
