//! Document source adapter: uniform raster-page access over a single
//! image or a multi-page PDF.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async
//! contexts. `tokio::task::spawn_blocking` moves rendering onto the
//! blocking thread pool so Tokio worker threads never stall on CPU-heavy
//! rasterisation. Image decoding takes the same route for the same reason.
//!
//! ## Why re-open the PDF per render?
//!
//! Only the current page's raster is ever held in memory; the document is
//! re-loaded from its byte buffer inside each blocking task. For the
//! hand-held, one-page-at-a-time cropping workflow, the per-page reload
//! cost is negligible next to rasterisation itself, and it keeps the
//! provider `Send` without threading pdfium handles across tasks.

use crate::document::{DocumentKind, ExamDocument};
use crate::error::{CropError, MathScanError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::sync::Arc;
use tracing::{debug, info};

/// One renderable surface derived from the source document.
#[derive(Debug, Clone)]
pub struct Page {
    /// The rasterised page pixels.
    pub image: DynamicImage,
    /// 1-based page number.
    pub number: usize,
    /// Total page count of the document (1 for raster images).
    pub total: usize,
}

impl Page {
    /// Natural pixel dimensions of the page raster.
    pub fn natural_size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

enum Backend {
    /// A single decoded image; the one page *is* the image.
    Raster,
    /// A PDF rendered lazily, page by page, at a fixed upscale factor.
    Pdf { scale: f32 },
}

/// Uniform page access over an [`ExamDocument`].
///
/// For a raster image there is exactly one page and navigation is a no-op.
/// For a PDF, pages are rendered on demand; only the page returned to the
/// caller is materialised, and navigating away discards it.
pub struct PageProvider {
    bytes: Arc<Vec<u8>>,
    backend: Backend,
    current_page: usize,
    total_pages: usize,
}

impl PageProvider {
    /// Open a document and render its first page.
    ///
    /// A document that cannot be decoded or whose first page cannot be
    /// rendered is rejected here, before any session is built on it.
    pub async fn open(
        document: &ExamDocument,
        scale: f32,
    ) -> Result<(Self, Page), MathScanError> {
        let bytes = document.shared_bytes();
        match document.kind() {
            DocumentKind::Pdf => {
                let total_pages = pdf_page_count(Arc::clone(&bytes)).await?;
                info!("PDF opened: {} pages, render scale {}", total_pages, scale);
                let provider = Self {
                    bytes,
                    backend: Backend::Pdf { scale },
                    current_page: 1,
                    total_pages,
                };
                let page = provider
                    .render(1)
                    .await
                    .map_err(|e| MathScanError::CorruptDocument {
                        detail: e.to_string(),
                    })?;
                Ok((provider, page))
            }
            _ => {
                let image = decode_raster(Arc::clone(&bytes)).await?;
                debug!("Raster document: {}x{} px", image.width(), image.height());
                let provider = Self {
                    bytes,
                    backend: Backend::Raster,
                    current_page: 1,
                    total_pages: 1,
                };
                let page = Page {
                    image,
                    number: 1,
                    total: 1,
                };
                Ok((provider, page))
            }
        }
    }

    /// Total page count (1 for raster images).
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Current 1-based page number.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Whether the source has more than one navigable page.
    pub fn is_paged(&self) -> bool {
        matches!(self.backend, Backend::Pdf { .. })
    }

    /// Render the given 1-based page.
    ///
    /// Fails with [`CropError::RenderFailed`] for invalid page numbers or a
    /// document that no longer rasterises; the failure blocks cropping on
    /// that page only.
    pub async fn render(&self, page_number: usize) -> Result<Page, CropError> {
        match self.backend {
            Backend::Raster => {
                if page_number != 1 {
                    return Err(CropError::RenderFailed {
                        page: page_number,
                        detail: "raster document has a single page".into(),
                    });
                }
                let image = decode_raster(Arc::clone(&self.bytes)).await.map_err(|e| {
                    CropError::RenderFailed {
                        page: 1,
                        detail: e.to_string(),
                    }
                })?;
                Ok(Page {
                    image,
                    number: 1,
                    total: 1,
                })
            }
            Backend::Pdf { scale } => {
                if page_number < 1 || page_number > self.total_pages {
                    return Err(CropError::RenderFailed {
                        page: page_number,
                        detail: format!("page out of range (total={})", self.total_pages),
                    });
                }
                let image =
                    render_pdf_page(Arc::clone(&self.bytes), page_number, scale).await?;
                debug!(
                    "Rendered page {} → {}x{} px",
                    page_number,
                    image.width(),
                    image.height()
                );
                Ok(Page {
                    image,
                    number: page_number,
                    total: self.total_pages,
                })
            }
        }
    }

    /// Move `delta` pages and render the target page.
    ///
    /// The target index is clamped to `[1, total_pages]`; if the clamp
    /// lands on the current page the call is a no-op that issues no render
    /// and returns `Ok(None)`. On render failure the current page number
    /// is left unchanged.
    pub async fn navigate(&mut self, delta: i64) -> Result<Option<Page>, CropError> {
        let target = (self.current_page as i64 + delta).clamp(1, self.total_pages as i64) as usize;
        if target == self.current_page {
            return Ok(None);
        }
        let page = self.render(target).await?;
        self.current_page = target;
        Ok(Some(page))
    }
}

/// Decode a raster image document on the blocking pool.
async fn decode_raster(bytes: Arc<Vec<u8>>) -> Result<DynamicImage, MathScanError> {
    tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes).map_err(|e| MathScanError::CorruptDocument {
            detail: format!("image decode failed: {}", e),
        })
    })
    .await
    .map_err(|e| MathScanError::Internal(format!("decode task panicked: {}", e)))?
}

/// Count the pages of a PDF on the blocking pool.
async fn pdf_page_count(bytes: Arc<Vec<u8>>) -> Result<usize, MathScanError> {
    tokio::task::spawn_blocking(move || {
        let pdfium = Pdfium::default();
        let document = pdfium
            .load_pdf_from_byte_slice(&bytes, None)
            .map_err(|e| MathScanError::CorruptDocument {
                detail: format!("{:?}", e),
            })?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| MathScanError::Internal(format!("page-count task panicked: {}", e)))?
}

/// Rasterise one PDF page at the given linear scale on the blocking pool.
async fn render_pdf_page(
    bytes: Arc<Vec<u8>>,
    page_number: usize,
    scale: f32,
) -> Result<DynamicImage, CropError> {
    tokio::task::spawn_blocking(move || render_pdf_page_blocking(&bytes, page_number, scale))
        .await
        .map_err(|e| CropError::RenderFailed {
            page: page_number,
            detail: format!("render task panicked: {}", e),
        })?
}

fn render_pdf_page_blocking(
    bytes: &[u8],
    page_number: usize,
    scale: f32,
) -> Result<DynamicImage, CropError> {
    let pdfium = Pdfium::default();

    let document =
        pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| CropError::RenderFailed {
                page: page_number,
                detail: format!("{:?}", e),
            })?;

    let page = document
        .pages()
        .get((page_number - 1) as u16)
        .map_err(|e| CropError::RenderFailed {
            page: page_number,
            detail: format!("{:?}", e),
        })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| CropError::RenderFailed {
            page: page_number,
            detail: format!("{:?}", e),
        })?;

    Ok(bitmap.as_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_document(width: u32, height: u32) -> ExamDocument {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 20, 30, 255]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        ExamDocument::from_bytes(buf).unwrap()
    }

    #[tokio::test]
    async fn raster_document_is_one_page() {
        let doc = png_document(40, 30);
        let (provider, page) = PageProvider::open(&doc, 2.0).await.unwrap();
        assert_eq!(provider.total_pages(), 1);
        assert_eq!(provider.current_page(), 1);
        assert!(!provider.is_paged());
        assert_eq!(page.number, 1);
        assert_eq!(page.total, 1);
        assert_eq!(page.natural_size(), (40, 30));
    }

    #[tokio::test]
    async fn raster_navigation_is_noop() {
        let doc = png_document(8, 8);
        let (mut provider, _page) = PageProvider::open(&doc, 2.0).await.unwrap();
        assert!(provider.navigate(1).await.unwrap().is_none());
        assert!(provider.navigate(-1).await.unwrap().is_none());
        assert_eq!(provider.current_page(), 1);
    }

    #[tokio::test]
    async fn raster_rejects_other_page_numbers() {
        let doc = png_document(8, 8);
        let (provider, _page) = PageProvider::open(&doc, 2.0).await.unwrap();
        assert!(matches!(
            provider.render(2).await,
            Err(CropError::RenderFailed { page: 2, .. })
        ));
    }

    #[tokio::test]
    async fn truncated_image_is_corrupt() {
        // Valid PNG magic, truncated body: passes intake, fails decode.
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&[0u8; 8]);
        let doc = ExamDocument::from_bytes(bytes).unwrap();
        assert!(matches!(
            PageProvider::open(&doc, 2.0).await,
            Err(MathScanError::CorruptDocument { .. })
        ));
    }
}
