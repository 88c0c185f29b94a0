//! Structured error types for folio.
//!
//! Two layers. [`LayoutError`] is raised by a single node while it is being
//! built, measured or positioned, and is recoverable at the page boundary.
//! [`FolioError`] covers everything that stops a whole document: unreadable
//! XML, unreadable font files, I/O.

use std::fmt;

use thiserror::Error;

/// Why a node could not be laid out.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// A `width`/`height` request that is not `auto`, `fill` or a number.
    #[error("malformed size request '{token}'")]
    MalformedSizeRequest { token: String },

    /// The font service could not answer a query for this font.
    #[error("font metrics unavailable for '{font}': {reason}")]
    FontMetricsUnavailable { font: String, reason: String },

    /// The node kind has no layout rule.
    #[error("{variant} has no layout rule")]
    UnsupportedVariant { variant: &'static str },

    /// The tree broke one of its structural guarantees.
    #[error("tree invariant violated: {reason}")]
    TreeInvariantViolation { reason: String },
}

impl LayoutError {
    pub(crate) fn invariant(reason: impl Into<String>) -> Self {
        LayoutError::TreeInvariantViolation {
            reason: reason.into(),
        }
    }

    pub(crate) fn font(font: impl fmt::Display, reason: impl Into<String>) -> Self {
        LayoutError::FontMetricsUnavailable {
            font: font.to_string(),
            reason: reason.into(),
        }
    }
}

/// A [`LayoutError`] together with the structural path of the node that
/// raised it, e.g. `Page/Stack/Stack[1]/TextView[0]`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{path}: {error}")]
pub struct NodeFailure {
    pub path: String,
    #[source]
    pub error: LayoutError,
}

impl NodeFailure {
    pub fn new(path: impl Into<String>, error: LayoutError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    /// Prefix the path with the parent segment as the error unwinds.
    pub(crate) fn within(mut self, segment: &str) -> Self {
        self.path = if self.path.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", segment, self.path)
        };
        self
    }
}

/// A page whose layout failed. The page is skipped; the rest of the
/// document is still produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PageError {
    /// Zero-based page index within its document.
    pub page_index: usize,
    /// Source line of the `<Page>` element.
    pub line: usize,
    pub failure: NodeFailure,
}

impl fmt::Display for PageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {} (line {}) failed at {}",
            self.page_index + 1,
            self.line,
            self.failure
        )
    }
}

impl std::error::Error for PageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.failure)
    }
}

/// The unified error type for everything that aborts a whole document.
#[derive(Debug, Error)]
pub enum FolioError {
    /// The document is not well-formed or not a folio document.
    #[error("invalid document (line {line}): {message}")]
    Xml { line: usize, message: String },

    /// A font file could not be read or parsed.
    #[error("font error: {0}")]
    Font(String),

    /// An image could not be read or decoded.
    #[error("image error: {0}")]
    Image(String),

    /// PDF generation failed.
    #[error("render error: {0}")]
    Render(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize layout: {0}")]
    Json(#[from] serde_json::Error),
}
