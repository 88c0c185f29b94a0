//! # Folio
//!
//! Lays out XML page descriptions with a measure/position box model and
//! writes them to PDF.
//!
//! A page is a tree of views: text, images, and stacks that place their
//! children one after another. Every node asks for `auto`, `fill` or an
//! exact size on each axis; the layout passes turn those requests into
//! absolute boxes, and the PDF writer draws the boxes.
//!
//! ## Architecture
//!
//! ```text
//! XML document
//!       ↓
//!   [builder]  Parse the document, build one node tree per page
//!       ↓
//!   [layout]   Measure bottom-up, position top-down
//!       ↓        (line breaking in [text], metrics from [font])
//!   [pdf]      Serialize to PDF bytes
//! ```
//!
//! Pages fail independently: a page that cannot be laid out is reported
//! and left out, and the rest of the document is still rendered.

pub mod builder;
pub mod config;
pub mod error;
pub mod font;
pub mod image_loader;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod style;
pub mod text;

use std::path::Path;

use builder::Document;
pub use config::RenderOptions;
pub use error::{FolioError, LayoutError, NodeFailure, PageError};
use font::FontContext;
use layout::{LayoutEngine, LayoutInfo, LayoutPage};
use pdf::PdfWriter;

/// Result of rendering: the PDF plus every page that was left out.
#[derive(Debug)]
pub struct RenderOutput {
    pub pdf: Vec<u8>,
    pub failures: Vec<PageError>,
}

/// Accumulates pages from one or more documents into a single PDF.
///
/// Fonts declared by a document stay registered for the documents added
/// after it.
pub struct Renderer {
    engine: LayoutEngine,
    fonts: FontContext,
    pages: Vec<LayoutPage>,
    failures: Vec<PageError>,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            engine: LayoutEngine::new(options),
            fonts: FontContext::new(),
            pages: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Lay out every page of an XML document. Relative paths inside the
    /// document resolve against `base_dir`.
    ///
    /// Returns the number of pages that were laid out. Page failures are
    /// collected, not returned; an error here means the whole document was
    /// unusable and nothing from it was added.
    pub fn add_document(&mut self, xml: &str, base_dir: &Path) -> Result<usize, FolioError> {
        let document = Document::parse(xml, base_dir, self.engine.options())?;
        document.register_fonts(&mut self.fonts)?;

        let report = self.engine.layout(&document, &self.fonts);
        let laid_out = report.pages.len();
        self.pages.extend(report.pages);
        self.failures.extend(report.failures);
        Ok(laid_out)
    }

    /// Read and add a document from disk.
    pub fn add_file(&mut self, path: &Path) -> Result<usize, FolioError> {
        log::info!("Processing {}", path.display());
        let xml = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.add_document(&xml, base_dir)
    }

    pub fn pages(&self) -> &[LayoutPage] {
        &self.pages
    }

    /// Resolved geometry of every page added so far.
    pub fn layout_info(&self) -> LayoutInfo {
        LayoutInfo::from_pages(&self.pages)
    }

    /// Write all laid-out pages to PDF.
    pub fn finish(self) -> Result<RenderOutput, FolioError> {
        let writer =
            PdfWriter::new().with_bounding_boxes(self.engine.options().show_bounding_boxes);
        let pdf = writer.write(&self.pages, &self.fonts)?;
        Ok(RenderOutput {
            pdf,
            failures: self.failures,
        })
    }
}

/// Render a single XML document with default options.
pub fn render_xml(xml: &str) -> Result<RenderOutput, FolioError> {
    let mut renderer = Renderer::new(RenderOptions::default());
    renderer.add_document(xml, Path::new("."))?;
    renderer.finish()
}
