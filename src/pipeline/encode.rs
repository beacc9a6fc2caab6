//! Image encoding: `DynamicImage` → base64 JPEG [`PageImage`].
//!
//! Extraction services accept images as base64 blobs inline in the JSON
//! request body. JPEG at quality 80 keeps an eight-page contract well under
//! request-size limits while the typed text stays legible at 1.5× scale.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::debug;

/// Media type of every encoded page.
pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";

/// One rasterised page, ready to be attached to an extraction request.
#[derive(Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-indexed page number within the source document.
    pub page_num: usize,
    pub mime_type: &'static str,
    /// Raw base64 (no data-URI prefix).
    pub data: String,
}

impl std::fmt::Debug for PageImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageImage")
            .field("page_num", &self.page_num)
            .field("mime_type", &self.mime_type)
            .field("base64_len", &self.data.len())
            .finish()
    }
}

/// Encode a rasterised page as base64 JPEG.
///
/// JPEG has no alpha channel, so the bitmap is flattened to RGB first.
pub fn encode_page(
    page_num: usize,
    img: &DynamicImage,
    quality: u8,
) -> Result<PageImage, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;

    let data = STANDARD.encode(&buf);
    debug!("Encoded page {} → {} bytes base64", page_num, data.len());

    Ok(PageImage {
        page_num,
        mime_type: JPEG_MEDIA_TYPE,
        data,
    })
}
