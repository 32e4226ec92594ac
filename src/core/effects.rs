//! Mechanical "processed" variant of a captured photo.
//!
//! A fixed chain of pixel transforms: warning-palette rebalance, scan lines,
//! a label banner and a red frame. It does not depend on anything external
//! and always produces an image for a non-empty input.

use crate::core::capture::{CaptureError, CapturedImage};
use image::{Rgba, RgbaImage};

/// Banner text for a subject that was denied entry.
pub const DENIED_LABEL: &str = "ACCESO DENEGADO";

/// Banner text once the subject has been identified.
pub const IDENTIFIED_LABEL: &str = "IDENTIFICADO";

const BORDER_COLOR: Rgba<u8> = Rgba([255, 32, 32, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 236, 236, 255]);
const SCANLINE_PERIOD: u32 = 4;
const SCANLINE_GAIN: f32 = 0.65;
const BANNER_GAIN: f32 = 0.3;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// Run the full effect chain and encode the result as PNG.
pub fn render_processed(photo: &RgbaImage, label: &str) -> Result<CapturedImage, CaptureError> {
    CapturedImage::png(&apply_effects(photo, label))
}

/// Run the full effect chain on a raster.
pub fn apply_effects(photo: &RgbaImage, label: &str) -> RgbaImage {
    let mut image = photo.clone();
    rebalance_to_warning(&mut image);
    overlay_scanlines(&mut image);
    let border = border_thickness(image.width(), image.height());
    draw_banner(&mut image, label, border);
    draw_border(&mut image, border);
    image
}

/// Push colors toward a red warning palette.
pub fn rebalance_to_warning(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        pixel.0 = [
            scale_channel(r, 1.25, 30.0),
            scale_channel(g, 0.75, 0.0),
            scale_channel(b, 0.55, 0.0),
            a,
        ];
    }
}

/// Darken every fourth row.
pub fn overlay_scanlines(image: &mut RgbaImage) {
    for (_, y, pixel) in image.enumerate_pixels_mut() {
        if y % SCANLINE_PERIOD == 0 {
            dim(pixel, SCANLINE_GAIN);
        }
    }
}

/// Frame thickness for an image of the given size.
pub fn border_thickness(width: u32, height: u32) -> u32 {
    (width.min(height) / 40).max(2)
}

/// Paint a solid frame around the image.
pub fn draw_border(image: &mut RgbaImage, thickness: u32) {
    let (width, height) = image.dimensions();
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if x < thickness
            || y < thickness
            || x + thickness >= width
            || y + thickness >= height
        {
            *pixel = BORDER_COLOR;
        }
    }
}

/// Dim a strip above the bottom border and write `label` in it.
///
/// Skipped when the image is too small to hold even a one-pixel font.
pub fn draw_banner(image: &mut RgbaImage, label: &str, border: u32) {
    let (width, height) = image.dimensions();
    let glyphs: Vec<Option<[u8; 7]>> = label.chars().map(glyph).collect();
    if glyphs.is_empty() {
        return;
    }

    let inner_width = width.saturating_sub(border * 2);
    let unit_width = glyphs.len() as u32 * (GLYPH_WIDTH + 1) - 1;
    let scale = ((inner_width * 7 / 10) / unit_width)
        .min(height / 12 / GLYPH_HEIGHT)
        .max(1);

    let padding = scale * 2;
    let banner_height = GLYPH_HEIGHT * scale + padding * 2;
    if banner_height + border * 2 > height {
        return;
    }
    let banner_top = height - border - banner_height;

    for y in banner_top..height - border {
        for x in border..width.saturating_sub(border) {
            dim(image.get_pixel_mut(x, y), BANNER_GAIN);
        }
    }

    let text_width = unit_width * scale;
    let mut cursor = border + inner_width.saturating_sub(text_width) / 2;
    let baseline = banner_top + padding;
    for rows in glyphs {
        if let Some(rows) = rows {
            stamp_glyph(image, &rows, cursor, baseline, scale);
        }
        cursor += (GLYPH_WIDTH + 1) * scale;
    }
}

fn stamp_glyph(image: &mut RgbaImage, rows: &[u8; 7], left: u32, top: u32, scale: u32) {
    let (width, height) = image.dimensions();
    for (row, bits) in rows.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) == 0 {
                continue;
            }
            let x0 = left + col * scale;
            let y0 = top + row as u32 * scale;
            for y in y0..y0 + scale {
                for x in x0..x0 + scale {
                    if x < width && y < height {
                        image.put_pixel(x, y, TEXT_COLOR);
                    }
                }
            }
        }
    }
}

fn scale_channel(value: u8, gain: f32, offset: f32) -> u8 {
    (value as f32 * gain + offset).round().clamp(0.0, 255.0) as u8
}

fn dim(pixel: &mut Rgba<u8>, gain: f32) {
    for channel in pixel.0.iter_mut().take(3) {
        *channel = scale_channel(*channel, gain, 0.0);
    }
}

/// 5x7 bitmap for a character; each row's low five bits, MSB leftmost.
///
/// Lowercase and accented Spanish letters fold onto their plain capitals.
/// Space and unsupported characters have no glyph.
fn glyph(c: char) -> Option<[u8; 7]> {
    let c = match c {
        'á' | 'Á' => 'A',
        'é' | 'É' => 'E',
        'í' | 'Í' => 'I',
        'ó' | 'Ó' => 'O',
        'ú' | 'Ú' | 'ü' | 'Ü' => 'U',
        'ñ' | 'Ñ' => 'N',
        other => other.to_ascii_uppercase(),
    };

    let rows = match c {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        _ => return None,
    };
    Some(rows)
}
