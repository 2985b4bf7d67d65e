//! Colour helpers: hex parsing, alpha flattening, transparency detection
//! and the colour picker.

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid colour '{0}': expected #rgb, #rrggbb or #rrggbbaa")]
pub struct ColorError(pub String);

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (leading `#` optional).
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>, ColorError> {
    let hex = value.trim().trim_start_matches('#');
    let err = || ColorError(value.to_string());
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(err());
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).map_err(|_| err());

    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = byte(&c.to_string())?;
                rgb[i] = v * 17;
            }
            Ok(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 => Ok(Rgba([
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            255,
        ])),
        8 => Ok(Rgba([
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            byte(&hex[6..8])?,
        ])),
        _ => Err(err()),
    }
}

/// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
pub fn to_hex(color: Rgba<u8>) -> String {
    let [r, g, b, a] = color.0;
    if a == 255 {
        format!("#{r:02x}{g:02x}{b:02x}")
    } else {
        format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
    }
}

/// True when the image has an alpha channel and any pixel is not opaque.
pub fn has_transparency(image: &DynamicImage) -> bool {
    if !image.color().has_alpha() {
        return false;
    }
    image.pixels().any(|(_, _, p)| p.0[3] < 255)
}

/// Composite the image onto an opaque `background` (source-over).
///
/// The background's own alpha is ignored: the result is always opaque.
pub fn flatten_onto(image: &DynamicImage, background: Rgba<u8>) -> RgbaImage {
    let mut out = image.to_rgba8();
    let [br, bg, bb, _] = background.0;
    for pixel in out.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as u32;
        let inv = 255 - alpha;
        let blend = |fg: u8, bgc: u8| ((fg as u32 * alpha + bgc as u32 * inv + 127) / 255) as u8;
        *pixel = Rgba([blend(r, br), blend(g, bg), blend(b, bb), 255]);
    }
    out
}

/// A colour sampled from the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickedColor {
    pub x: u32,
    pub y: u32,
    pub rgba: [u8; 4],
    pub hex: String,
}

impl PickedColor {
    pub fn new(x: u32, y: u32, color: Rgba<u8>) -> Self {
        Self {
            x,
            y,
            rgba: color.0,
            hex: to_hex(color),
        }
    }

    /// CSS `rgb()`/`rgba()` notation.
    pub fn css(&self) -> String {
        let [r, g, b, a] = self.rgba;
        if a == 255 {
            format!("rgb({r}, {g}, {b})")
        } else {
            format!("rgba({r}, {g}, {b}, {:.2})", a as f32 / 255.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(parse_hex_color("#ffffff"), Ok(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_hex_color("f00"), Ok(Rgba([255, 0, 0, 255])));
        assert_eq!(parse_hex_color("#00000080"), Ok(Rgba([0, 0, 0, 128])));
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(parse_hex_color("#ffff").is_err());
        assert!(parse_hex_color("#gggggg").is_err());
        assert!(parse_hex_color("").is_err());
    }

    #[test]
    fn hex_roundtrip_for_opaque_and_translucent() {
        assert_eq!(to_hex(Rgba([18, 52, 86, 255])), "#123456");
        assert_eq!(to_hex(Rgba([18, 52, 86, 0])), "#12345600");
    }

    #[test]
    fn opaque_rgb_image_has_no_transparency() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        assert!(!has_transparency(&img));
    }

    #[test]
    fn rgba_image_with_clear_pixel_has_transparency() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([10, 10, 10, 255]));
        assert!(!has_transparency(&DynamicImage::ImageRgba8(img.clone())));
        img.put_pixel(2, 2, Rgba([0, 0, 0, 0]));
        assert!(has_transparency(&DynamicImage::ImageRgba8(img)));
    }

    #[test]
    fn flatten_replaces_clear_pixels_with_background() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 255, 255]));
        img.put_pixel(1, 0, Rgba([0, 0, 0, 0]));
        let flat = flatten_onto(&DynamicImage::ImageRgba8(img), Rgba([255, 255, 255, 255]));
        assert_eq!(flat.get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(flat.get_pixel(1, 0), &Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn flatten_blends_half_alpha() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128]));
        let flat = flatten_onto(&DynamicImage::ImageRgba8(img), Rgba([255, 255, 255, 255]));
        let p = flat.get_pixel(0, 0);
        assert_eq!(p.0[3], 255);
        assert!((126..=128).contains(&p.0[0]));
    }

    #[test]
    fn picked_color_css_forms() {
        let opaque = PickedColor::new(0, 0, Rgba([1, 2, 3, 255]));
        assert_eq!(opaque.css(), "rgb(1, 2, 3)");
        assert_eq!(opaque.hex, "#010203");

        let clear = PickedColor::new(0, 0, Rgba([1, 2, 3, 0]));
        assert_eq!(clear.css(), "rgba(1, 2, 3, 0.00)");
    }
}
