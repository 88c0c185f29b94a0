//! # Layout Driver
//!
//! A page is laid out in two passes over its node tree:
//!
//! 1. **Measure** (bottom-up). Every node is offered the space its parent
//!    has left and resolves its own width and height. Text is broken into
//!    lines here, because a paragraph's height depends on where it wraps.
//! 2. **Position** (top-down). Every node is placed inside its parent, then
//!    stacks apply gravity by sliding whole subtrees.
//!
//! The page root is offered the full page. Pages are independent: a page
//! that fails either pass is reported as a [`PageError`] and skipped, and
//! the rest of the document is still laid out.

pub mod measure;
pub mod position;

use serde::Serialize;

use crate::builder::Document;
use crate::config::RenderOptions;
use crate::error::{NodeFailure, PageError};
use crate::font::FontService;
use crate::model::{Node, NodeKind};

pub use measure::Measurer;
pub use position::{offset_position, position};

/// A width/height pair in points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// A fully laid-out page ready for PDF serialization.
#[derive(Debug, Clone)]
pub struct LayoutPage {
    /// Zero-based index of the page within its document.
    pub page_index: usize,
    pub width: f64,
    pub height: f64,
    pub root: Node,
}

/// What came out of laying out one document.
#[derive(Debug, Default)]
pub struct LayoutReport {
    pub pages: Vec<LayoutPage>,
    pub failures: Vec<PageError>,
}

/// The main layout engine.
pub struct LayoutEngine {
    options: RenderOptions,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl LayoutEngine {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Measure and position one page tree against the page's full area.
    pub fn layout_page<F: FontService + ?Sized>(
        &self,
        root: &mut Node,
        fonts: &F,
    ) -> Result<(), NodeFailure> {
        let (page_width, page_height) = self.options.page_size.dimensions();
        let name = root.kind_name();
        Measurer::new(fonts, self.options.max_depth)
            .measure(root, page_width, page_height)
            .and_then(|_| position(root, 0.0, 0.0))
            .map_err(|f| f.within(name).within("Page"))
    }

    /// Build and lay out every page of `document`. Failed pages are logged,
    /// collected and skipped.
    pub fn layout<F: FontService + ?Sized>(&self, document: &Document, fonts: &F) -> LayoutReport {
        let (width, height) = self.options.page_size.dimensions();
        let mut report = LayoutReport::default();

        for page in document.pages() {
            log::info!("Building page {} (line {})", page.index + 1, page.line);
            let result = document
                .build_page(page)
                .map_err(|f| f.within("Page"))
                .and_then(|mut root| self.layout_page(&mut root, fonts).map(|_| root));

            match result {
                Ok(root) => report.pages.push(LayoutPage {
                    page_index: page.index,
                    width,
                    height,
                    root,
                }),
                Err(failure) => {
                    let error = PageError {
                        page_index: page.index,
                        line: page.line,
                        failure,
                    };
                    log::warn!("Skipping {}", error);
                    report.failures.push(error);
                }
            }
        }

        report
    }
}

// ── Serializable layout metadata (for debugging and tooling) ───

/// Resolved geometry of every laid-out page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInfo {
    pub pages: Vec<PageInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub page_index: usize,
    pub width: f64,
    pub height: f64,
    pub root: ElementInfo,
}

/// Resolved geometry of one node, with its subtree.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementInfo {
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementInfo>,
}

impl LayoutInfo {
    pub fn from_pages(pages: &[LayoutPage]) -> Self {
        LayoutInfo {
            pages: pages
                .iter()
                .map(|page| PageInfo {
                    page_index: page.page_index,
                    width: page.width,
                    height: page.height,
                    root: ElementInfo::from_node(&page.root),
                })
                .collect(),
        }
    }
}

impl ElementInfo {
    fn from_node(node: &Node) -> Self {
        let lines = match &node.kind {
            NodeKind::Text(text) => Some(text.lines.clone()),
            _ => None,
        };
        ElementInfo {
            kind: node.kind_name().to_string(),
            x: node.frame.x,
            y: node.frame.y,
            width: node.frame.width,
            height: node.frame.height,
            lines,
            children: node.children().iter().map(ElementInfo::from_node).collect(),
        }
    }
}
