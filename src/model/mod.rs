//! # Document Model
//!
//! The layout tree. A page holds exactly one root node; container nodes own
//! their children outright, so the tree has no shared or back references and
//! a node's identity is simply where it sits.
//!
//! Four kinds of node exist: text, images, stacks (children placed one after
//! another along an axis) and overlays (children drawn on top of each other).
//!
//! Every node carries its layout requests (size modes, margins, padding,
//! gravity) plus a [`Frame`] that the layout passes fill in. The frame is
//! meaningless until the node has been measured and positioned; the
//! [`LayoutState`] records how far along a node is.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::font::FontRef;
use crate::image_loader::LoadedImage;
use crate::style::{Gravity, Orientation, SizeMode};

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    Letter,
    Legal,
    A4,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::Letter => (72.0 * 8.5, 72.0 * 11.0),
            PageSize::Legal => (72.0 * 8.5, 72.0 * 14.0),
            PageSize::A4 => (595.28, 841.89),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "letter" => Some(PageSize::Letter),
            "legal" => Some(PageSize::Legal),
            "a4" => Some(PageSize::A4),
            _ => None,
        }
    }
}

/// Edge values (top, right, bottom, left) used for margin and padding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// Resolved geometry of a node. `x`/`y` are absolute page coordinates of the
/// border box (top-left origin, y grows downward).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// How far a node has progressed through the layout passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutState {
    #[default]
    Unmeasured,
    Measured,
    Positioned,
}

/// A text run in a single font at a single size.
#[derive(Debug, Clone)]
pub struct TextContent {
    pub text: String,
    pub font: FontRef,
    pub size: f64,
    /// Lines produced by the line breaker during measurement.
    pub lines: Vec<String>,
    /// Height of one line in points, set during measurement.
    pub line_height: f64,
}

/// An image whose natural size is supplied by the document builder.
#[derive(Debug, Clone, Default)]
pub struct ImageContent {
    pub src: String,
    /// Natural (width, height) in points, if known.
    pub intrinsic: Option<(f64, f64)>,
    pub data: Option<Arc<LoadedImage>>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Text(TextContent),
    Image(ImageContent),
    Stack {
        orientation: Orientation,
        children: Vec<Node>,
    },
    Overlay {
        children: Vec<Node>,
    },
}

/// A node in the layout tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub width: SizeMode,
    pub height: SizeMode,
    pub margin: Edges,
    pub padding: Edges,
    pub gravity: Gravity,
    pub frame: Frame,
    pub state: LayoutState,
}

impl Node {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            kind,
            width: SizeMode::Auto,
            height: SizeMode::Auto,
            margin: Edges::default(),
            padding: Edges::default(),
            gravity: Gravity::NONE,
            frame: Frame::default(),
            state: LayoutState::Unmeasured,
        }
    }

    /// Create a text node.
    pub fn text(content: &str, font: FontRef, size: f64) -> Self {
        Self::with_kind(NodeKind::Text(TextContent {
            text: content.to_string(),
            font,
            size,
            lines: Vec::new(),
            line_height: 0.0,
        }))
    }

    /// Create an image node with a known natural size.
    pub fn image(src: &str, intrinsic: Option<(f64, f64)>) -> Self {
        Self::with_kind(NodeKind::Image(ImageContent {
            src: src.to_string(),
            intrinsic,
            data: None,
        }))
    }

    /// Create a stack.
    pub fn stack(orientation: Orientation, children: Vec<Node>) -> Self {
        Self::with_kind(NodeKind::Stack {
            orientation,
            children,
        })
    }

    /// Create an overlay.
    pub fn overlay(children: Vec<Node>) -> Self {
        Self::with_kind(NodeKind::Overlay { children })
    }

    pub fn with_size(mut self, width: SizeMode, height: SizeMode) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_margin(mut self, margin: Edges) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_padding(mut self, padding: Edges) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Name used in diagnostics and layout dumps.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Text(_) => "TextView",
            NodeKind::Image(_) => "ImageView",
            NodeKind::Stack { .. } => "Stack",
            NodeKind::Overlay { .. } => "Overlay",
        }
    }

    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Stack { children, .. } | NodeKind::Overlay { children } => children,
            NodeKind::Text(_) | NodeKind::Image(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> &mut [Node] {
        match &mut self.kind {
            NodeKind::Stack { children, .. } | NodeKind::Overlay { children } => children,
            NodeKind::Text(_) | NodeKind::Image(_) => &mut [],
        }
    }

    /// Width of the margin box (resolved width plus horizontal margins).
    pub fn outer_width(&self) -> f64 {
        self.frame.width + self.margin.horizontal()
    }

    /// Height of the margin box (resolved height plus vertical margins).
    pub fn outer_height(&self) -> f64 {
        self.frame.height + self.margin.vertical()
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(Node::subtree_len).sum::<usize>()
    }
}
