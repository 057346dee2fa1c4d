//! In-process raster layers for thumbnails.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::overlay::Color;

/// Gap between inset tiles and the canvas edges.
pub const INSET_MARGIN: u32 = 20;
/// White frame around each inset tile.
pub const INSET_BORDER: u32 = 3;
/// Background blur strength.
pub const BACKGROUND_BLUR_SIGMA: f32 = 5.0;
/// Background brightness multiplier.
pub const BACKGROUND_BRIGHTNESS: f32 = 0.6;
/// Opacity of the band behind the title.
pub const TOP_BAND_ALPHA: f32 = 180.0 / 255.0;

/// Outer rectangle of an inset tile, border included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scale to cover `width` x `height`, then centre-crop.
pub fn aspect_fill(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let (iw, ih) = image.dimensions();
    if iw == 0 || ih == 0 || width == 0 || height == 0 {
        return RgbImage::new(width, height);
    }
    let ratio = (width as f64 / iw as f64).max(height as f64 / ih as f64);
    let scaled_w = ((iw as f64 * ratio).ceil() as u32).max(width);
    let scaled_h = ((ih as f64 * ratio).ceil() as u32).max(height);
    let scaled = imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle);
    let x = (scaled_w - width) / 2;
    let y = (scaled_h - height) / 2;
    imageops::crop_imm(&scaled, x, y, width, height).to_image()
}

/// Blurred, darkened full-canvas background.
pub fn background(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    let filled = aspect_fill(image, width, height);
    let mut blurred = imageops::blur(&filled, BACKGROUND_BLUR_SIGMA);
    scale_brightness(&mut blurred, BACKGROUND_BRIGHTNESS);
    blurred
}

pub fn scale_brightness(image: &mut RgbImage, factor: f32) {
    for pixel in image.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = (*channel as f32 * factor).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Up to three 16:9 tiles along the bottom edge, left to right.
///
/// Tile width leaves a margin on both sides and between tiles so the
/// row always fits the canvas.
pub fn inset_slots(width: u32, height: u32, count: usize) -> Vec<Slot> {
    let tile_w = width.saturating_sub(4 * INSET_MARGIN) / 3;
    let tile_h = tile_w * 9 / 16;
    if tile_w <= 2 * INSET_BORDER || tile_h + INSET_MARGIN > height {
        return Vec::new();
    }
    let y = height - INSET_MARGIN - tile_h;
    (0..count.min(3) as u32)
        .map(|i| Slot {
            x: INSET_MARGIN + i * (tile_w + INSET_MARGIN),
            y,
            width: tile_w,
            height: tile_h,
        })
        .collect()
}

/// Paste `image` into `slot` with a white border.
pub fn draw_inset(canvas: &mut RgbImage, image: &RgbImage, slot: Slot) {
    let mut tile = RgbImage::from_pixel(slot.width, slot.height, Rgb([255, 255, 255]));
    let inner_w = slot.width - 2 * INSET_BORDER;
    let inner_h = slot.height.saturating_sub(2 * INSET_BORDER);
    let inner = aspect_fill(image, inner_w, inner_h);
    imageops::replace(&mut tile, &inner, INSET_BORDER as i64, INSET_BORDER as i64);
    imageops::replace(canvas, &tile, slot.x as i64, slot.y as i64);
}

/// Blend a translucent band over the top `band_height` rows.
pub fn blend_top_band(canvas: &mut RgbImage, band_height: u32, color: Color) {
    let alpha = color.alpha.clamp(0.0, 1.0) as f32;
    let rows = band_height.min(canvas.height());
    for y in 0..rows {
        for x in 0..canvas.width() {
            let pixel = canvas.get_pixel_mut(x, y);
            for (channel, over) in pixel.0.iter_mut().zip(color.rgb) {
                let blended = *channel as f32 * (1.0 - alpha) + over as f32 * alpha;
                *channel = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Vertical gradient from `top` to black.
pub fn vertical_gradient(width: u32, height: u32, top: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(width, height, |_, y| {
        let t = 1.0 - y as f64 / height.max(1) as f64;
        Rgb(top.map(|c| (c as f64 * t) as u8))
    })
}
