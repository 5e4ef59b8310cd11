//! Image preprocessing — CLAHE contrast normalization, glare removal,
//! unsharp-mask sharpening.
//!
//! Runs upstream of embedding extraction to make document photographs
//! and webcam selfies more robust to lighting artifacts. All operations
//! are pure pixel transforms over `image::RgbImage`.

use image::RgbImage;
use thiserror::Error;

// --- Pipeline defaults ---
const DEFAULT_TILE_SIZE: u32 = 8;
const DOCUMENT_CLIP_LIMIT: f32 = 2.5;
const SELFIE_CLIP_LIMIT: f32 = 2.0;
const DOCUMENT_SHARPEN_AMOUNT: f32 = 0.3;

// Glare detection: bright, low-saturation hot spots on glossy documents.
const GLARE_BRIGHTNESS_MIN: u8 = 230;
const GLARE_SPREAD_MAX: u8 = 30;
const GLARE_TARGET_BRIGHTNESS: f32 = 200.0;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("image is empty ({width}x{height}) — capture must produce at least one pixel")]
    EmptyImage { width: u32, height: u32 },
}

/// ITU-R BT.601 luminance of one RGB pixel.
fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Apply Contrast-Limited Adaptive Histogram Equalization in-place.
///
/// The image is partitioned into `tile_size` × `tile_size` tiles (edge
/// tiles keep their actual, smaller pixel count). Per tile: a luminance
/// histogram is clipped at `clip_limit * tile_pixels / 256`, the clipped
/// mass is redistributed uniformly, and each pixel's luminance is
/// remapped through the tile's normalized CDF. RGB channels are scaled
/// by the new/old luminance ratio so hue is preserved while contrast
/// stretches. Output channels stay in [0, 255].
pub fn clahe_normalize(img: &mut RgbImage, clip_limit: f32, tile_size: u32) {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let step = tile_size.max(1);

    for tile_y in (0..height).step_by(step as usize) {
        for tile_x in (0..width).step_by(step as usize) {
            let tile_w = step.min(width - tile_x);
            let tile_h = step.min(height - tile_y);
            let tile_pixels = tile_w * tile_h;

            // Per-tile luminance histogram. Kept in f32: the clip level
            // is fractional for small tiles, and clipping must not
            // collapse sparsely-populated bins to zero.
            let mut hist = [0f32; 256];
            for y in tile_y..tile_y + tile_h {
                for x in tile_x..tile_x + tile_w {
                    let p = img.get_pixel(x, y);
                    let luma = luminance(p[0], p[1], p[2]).round() as usize;
                    hist[luma.min(255)] += 1.0;
                }
            }

            // Clip histogram and redistribute the excess uniformly
            let clip = clip_limit * tile_pixels as f32 / 256.0;
            let mut excess = 0f32;
            for bin in hist.iter_mut() {
                if *bin > clip {
                    excess += *bin - clip;
                    *bin = clip;
                }
            }
            let redist = excess / 256.0;
            for bin in hist.iter_mut() {
                *bin += redist;
            }

            // Build CDF
            let mut cdf = [0f32; 256];
            cdf[0] = hist[0];
            for i in 1..256 {
                cdf[i] = cdf[i - 1] + hist[i];
            }
            let cdf_min = cdf.iter().find(|&&v| v > 0.0).copied().unwrap_or(0.0);
            let cdf_max = cdf[255];
            let denom = cdf_max - cdf_min;
            if denom <= 0.0 {
                // Flat tile: every pixel shares one luminance bin.
                continue;
            }

            // Remap luminance, scaling RGB proportionally
            for y in tile_y..tile_y + tile_h {
                for x in tile_x..tile_x + tile_w {
                    let p = img.get_pixel_mut(x, y);
                    let old_luma = luminance(p[0], p[1], p[2]);
                    let idx = (old_luma.round() as usize).min(255);
                    let new_luma = (cdf[idx] - cdf_min) / denom * 255.0;
                    // Zero luminance would divide by zero; treat as 1.
                    let ratio = new_luma / if old_luma > 0.0 { old_luma } else { 1.0 };
                    for c in 0..3 {
                        p[c] = (p[c] as f32 * ratio).clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
    }
}

/// Suppress specular highlights in-place.
///
/// A pixel is treated as glare when its brightest channel exceeds 230
/// and the channel spread is under 30 (bright but unsaturated). Such
/// pixels are scaled toward a 200 max brightness; everything else is
/// left untouched.
pub fn remove_glare(img: &mut RgbImage) {
    for p in img.pixels_mut() {
        let max = p[0].max(p[1]).max(p[2]);
        let min = p[0].min(p[1]).min(p[2]);
        if max > GLARE_BRIGHTNESS_MIN && max - min < GLARE_SPREAD_MAX {
            let factor = GLARE_TARGET_BRIGHTNESS / max as f32;
            for c in 0..3 {
                p[c] = (p[c] as f32 * factor).clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Unsharp-mask sharpening with a 3×3 cross kernel.
///
/// Center weight `1 + 4*amount`, orthogonal neighbors `-amount`,
/// corners zero, applied per channel. The one-pixel border is copied
/// through unmodified.
pub fn sharpen(img: &RgbImage, amount: f32) -> RgbImage {
    let (width, height) = img.dimensions();
    let mut out = img.clone();
    if width < 3 || height < 3 {
        return out;
    }

    let center = 1.0 + 4.0 * amount;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let mut sharpened = [0f32; 3];
            for c in 0..3 {
                let v = img.get_pixel(x, y)[c] as f32 * center
                    - img.get_pixel(x, y - 1)[c] as f32 * amount
                    - img.get_pixel(x, y + 1)[c] as f32 * amount
                    - img.get_pixel(x - 1, y)[c] as f32 * amount
                    - img.get_pixel(x + 1, y)[c] as f32 * amount;
                sharpened[c] = v.clamp(0.0, 255.0);
            }
            let p = out.get_pixel_mut(x, y);
            for c in 0..3 {
                p[c] = sharpened[c] as u8;
            }
        }
    }
    out
}

/// Run the full preprocessing pipeline on a captured image.
///
/// Documents get glare removal first, a stronger CLAHE clip limit, and
/// a sharpening pass to recover printed detail; selfies get CLAHE only.
pub fn preprocess_image(mut img: RgbImage, is_document: bool) -> Result<RgbImage, PreprocessError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessError::EmptyImage { width, height });
    }

    if is_document {
        remove_glare(&mut img);
    }

    let clip_limit = if is_document {
        DOCUMENT_CLIP_LIMIT
    } else {
        SELFIE_CLIP_LIMIT
    };
    clahe_normalize(&mut img, clip_limit, DEFAULT_TILE_SIZE);

    if is_document {
        img = sharpen(&img, DOCUMENT_SHARPEN_AMOUNT);
    }

    tracing::debug!(width, height, is_document, clip_limit, "image preprocessed");
    Ok(img)
}
