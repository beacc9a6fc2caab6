//! PDF rasterisation: render the first pages of a document to JPEG via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking pool so the
//! orchestrator's bookkeeping (enqueue, reset, result removal) stays
//! responsive while a document renders. Once started, a render runs to
//! completion; the orchestrator discards the output if a reset happened
//! meanwhile.

use crate::config::QueueConfig;
use crate::error::ItemError;
use crate::pipeline::encode::{self, PageImage};
use crate::pipeline::input::Document;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Turns a document blob into an ordered sequence of page images.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render the document. Fails with an [`ItemError`] when the document is
    /// malformed or a page cannot be drawn.
    async fn rasterize(&self, document: &Document) -> Result<Vec<PageImage>, ItemError>;
}

/// pdfium-backed [`Rasterizer`].
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_pages: usize,
    scale: f32,
    jpeg_quality: u8,
    lib_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            scale: config.render_scale,
            jpeg_quality: config.jpeg_quality,
            lib_path: config.pdfium_lib_path.clone(),
        }
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, document: &Document) -> Result<Vec<PageImage>, ItemError> {
        let bytes = document.shared_bytes();
        let this = self.clone();

        tokio::task::spawn_blocking(move || this.render_blocking(&bytes))
            .await
            .map_err(|e| ItemError::Internal(format!("Render task panicked: {}", e)))?
    }
}

impl PdfiumRasterizer {
    /// Blocking implementation of page rendering.
    fn render_blocking(&self, bytes: &[u8]) -> Result<Vec<PageImage>, ItemError> {
        let pdfium = bind_pdfium(self.lib_path.as_deref())?;

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| ItemError::CorruptPdf {
                detail: format!("{:?}", e),
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        let to_render = pages_to_render(total_pages, self.max_pages);
        info!("PDF loaded: {} pages, rendering {}", total_pages, to_render);

        let render_config = PdfRenderConfig::new().scale_page_by_factor(self.scale);

        let mut results = Vec::with_capacity(to_render);

        for idx in 0..to_render {
            let page_num = idx + 1;
            let page = pages
                .get(idx as u16)
                .map_err(|e| ItemError::RenderFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| ItemError::RenderFailed {
                    page: page_num,
                    detail: format!("{:?}", e),
                })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                page_num,
                image.width(),
                image.height()
            );

            let encoded = encode::encode_page(page_num, &image, self.jpeg_quality).map_err(|e| {
                ItemError::EncodeFailed {
                    page: page_num,
                    detail: e.to_string(),
                }
            })?;
            results.push(encoded);
        }

        if results.is_empty() {
            return Err(ItemError::NoPages);
        }

        Ok(results)
    }
}

/// Number of pages to render for a document of `total_pages`.
fn pages_to_render(total_pages: usize, max_pages: usize) -> usize {
    total_pages.min(max_pages)
}

/// Bind pdfium from `lib_dir` when given, else from the system library path.
fn bind_pdfium(lib_dir: Option<&Path>) -> Result<Pdfium, ItemError> {
    let bindings = match lib_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| ItemError::PdfiumUnavailable(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_cap_applies() {
        assert_eq!(pages_to_render(20, 8), 8);
        assert_eq!(pages_to_render(3, 8), 3);
        assert_eq!(pages_to_render(0, 8), 0);
    }

    #[test]
    fn rasterizer_takes_settings_from_config() {
        let config = QueueConfig::builder()
            .max_pages(4)
            .jpeg_quality(70)
            .build()
            .unwrap();
        let r = PdfiumRasterizer::new(&config);
        assert_eq!(r.max_pages, 4);
        assert_eq!(r.jpeg_quality, 70);
        assert!(r.lib_path.is_none());
    }
}
