use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::io::Reader as ImageReader;
use image::{ColorType, ImageError, ImageFormat};
use serde::Serialize;
use std::io::Cursor;
use utoipa::ToSchema;

/// Basic properties of a decoded image.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ImageInfo {
    /// Container format, e.g. "JPEG" or "PNG"
    pub format: String,
    /// Pixel layout, e.g. "RGB" or "RGBA"
    pub color_type: String,
    pub width: u32,
    pub height: u32,
}

/// Decodes `bytes` and reports format, color layout and dimensions.
///
/// This is the inspectable form; most callers only need the collapsed
/// [`validate_image_format`] / [`image_info`] views.
pub fn probe_image(bytes: &[u8]) -> Result<ImageInfo, ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format();
    let img = reader.decode()?;

    Ok(ImageInfo {
        format: format.map(format_name).unwrap_or("unknown").to_string(),
        color_type: color_name(img.color()).to_string(),
        width: img.width(),
        height: img.height(),
    })
}

/// Gate used before accepting a camera capture: does this buffer decode as an
/// image at all? "Not an image" and "corrupt image" both answer `false`.
pub fn validate_image_format(bytes: &[u8]) -> bool {
    probe_image(bytes).is_ok()
}

/// Metadata for display purposes; `None` when the buffer does not decode.
pub fn image_info(bytes: &[u8]) -> Option<ImageInfo> {
    probe_image(bytes).ok()
}

/// Extracts the raw bytes from a camera payload, which arrives either as a
/// `data:image/...;base64,` URL or as a bare base64 string.
pub fn decode_data_url(data: &str) -> Result<Vec<u8>> {
    let payload = match data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    BASE64
        .decode(payload.trim())
        .context("payload is not valid base64")
}

fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::Png => "PNG",
        ImageFormat::Gif => "GIF",
        ImageFormat::WebP => "WEBP",
        _ => "unknown",
    }
}

fn color_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 | ColorType::L16 => "L",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn jpeg_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 10, 10]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_validate_accepts_png_and_jpeg() {
        assert!(validate_image_format(&png_fixture(4, 4)));
        assert!(validate_image_format(&jpeg_fixture(4, 4)));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        assert!(!validate_image_format(b"this is definitely not an image"));
        assert!(!validate_image_format(b""));
        // PNG magic followed by garbage: corrupt, not merely unrecognized.
        assert!(!validate_image_format(&[0x89, 0x50, 0x4E, 0x47, 0x00, 0x01, 0x02]));
    }

    #[test]
    fn test_image_info_dimensions() {
        let info = image_info(&png_fixture(7, 3)).unwrap();
        assert_eq!(info.format, "PNG");
        assert_eq!(info.color_type, "RGB");
        assert_eq!(info.width, 7);
        assert_eq!(info.height, 3);
    }

    #[test]
    fn test_image_info_on_invalid_input() {
        assert!(image_info(b"not an image").is_none());
    }

    #[test]
    fn test_decode_data_url() {
        let bytes = png_fixture(2, 2);
        let encoded = BASE64.encode(&bytes);

        let url = format!("data:image/png;base64,{encoded}");
        assert_eq!(decode_data_url(&url).unwrap(), bytes);

        // Bare base64 without the data-URL wrapper is accepted too.
        assert_eq!(decode_data_url(&encoded).unwrap(), bytes);
    }

    #[test]
    fn test_decode_data_url_rejects_invalid_base64() {
        assert!(decode_data_url("data:image/png;base64,!!!not-base64!!!").is_err());
    }
}
