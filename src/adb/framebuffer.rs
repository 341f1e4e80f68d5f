// Raw framebuffer to PNG conversion
use super::error::{AdbError, AdbResult};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, Rgb, Rgba, codecs::png::PngEncoder};
use std::io::Cursor;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Convert framebuffer bytes of a `width` x `height` screen into PNG.
///
/// Already-encoded PNG is returned untouched and JPEG is re-encoded. Raw
/// buffers are classified by bytes per pixel; any leading header bytes are
/// skipped by taking the trailing `pixels * bpp` bytes.
pub fn framebuffer_to_png(data: Vec<u8>, width: u32, height: u32) -> AdbResult<Vec<u8>> {
    if data.starts_with(PNG_MAGIC) {
        return Ok(data);
    }
    if data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8 {
        let img = image::load_from_memory_with_format(&data, ImageFormat::Jpeg).map_err(|e| {
            AdbError::FramebufferCaptureFailed {
                description: format!("failed to decode JPEG framebuffer: {e}"),
            }
        })?;
        return encode_png(&img);
    }

    let pixel_count = (width as usize) * (height as usize);
    if pixel_count == 0 {
        return Err(AdbError::FramebufferCaptureFailed {
            description: "screen dimensions unknown".into(),
        });
    }
    let data_len = data.len();
    let bytes_per_pixel = match data_len / pixel_count {
        n if n >= 4 => 4,
        3 => 3,
        2 => 2,
        1 => 1,
        _ => {
            return Err(AdbError::FramebufferCaptureFailed {
                description: format!(
                    "cannot determine framebuffer format: {data_len} bytes for {pixel_count} pixels"
                ),
            });
        }
    };
    let pixels = data[data_len - pixel_count * bytes_per_pixel..].to_vec();

    let img = match bytes_per_pixel {
        4 => ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, pixels).map(DynamicImage::ImageRgba8),
        3 => ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8),
        2 => ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, rgb565_to_rgb(&pixels))
            .map(DynamicImage::ImageRgb8),
        _ => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8),
    }
    .ok_or_else(|| AdbError::FramebufferCaptureFailed {
        description: format!("framebuffer does not fit {width}x{height} at {bytes_per_pixel} bpp"),
    })?;

    encode_png(&img)
}

fn rgb565_to_rgb(data: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(data.len() / 2 * 3);
    for chunk in data.chunks_exact(2) {
        let pixel = u16::from_le_bytes([chunk[0], chunk[1]]);
        let r = ((pixel >> 11) & 0x1F) as u8;
        let g = ((pixel >> 5) & 0x3F) as u8;
        let b = (pixel & 0x1F) as u8;
        rgb.push((r << 3) | (r >> 2));
        rgb.push((g << 2) | (g >> 4));
        rgb.push((b << 3) | (b >> 2));
    }
    rgb
}

fn encode_png(img: &DynamicImage) -> AdbResult<Vec<u8>> {
    let mut data = Vec::new();
    let encoder = PngEncoder::new(Cursor::new(&mut data));
    img.write_with_encoder(encoder)
        .map_err(|e| AdbError::PngEncodeFailed {
            description: e.to_string(),
        })?;
    Ok(data)
}
