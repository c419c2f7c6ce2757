//! QR image rendering
//!
//! Error-correction level H so printed codes survive wear. Output is a PNG
//! data URL ready to embed in a page or an email.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

const MIN_SIZE: u32 = 512;
const MAX_SIZE: u32 = 1024;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("encode: {0}")]
    Encode(#[from] qrcode::types::QrError),
    #[error("png: {0}")]
    Png(#[from] image::ImageError),
}

pub fn render_png(content: &str) -> Result<Vec<u8>, RenderError> {
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::H)?;
    let pixels = code
        .render::<Luma<u8>>()
        .min_dimensions(MIN_SIZE, MIN_SIZE)
        .max_dimensions(MAX_SIZE, MAX_SIZE)
        .build();

    let mut png = Vec::new();
    DynamicImage::ImageLuma8(pixels).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}

pub fn render_data_url(content: &str) -> Result<String, RenderError> {
    let png = render_png(content)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}
