//! # Measurement
//!
//! Bottom-up size resolution. Each node receives the space available to its
//! margin box, works out how big its content wants to be, and then resolves
//! each axis from its size mode:
//!
//! - `Auto`: desired content size plus padding
//! - `Fill`: everything that was offered, minus margins
//! - `Exact(v)`: `v`
//!
//! Stacks measure their children in order, and every child only gets what
//! its earlier siblings left over along the main axis. There is no weighted
//! distribution.
//!
//! Once a node is resolved both of its size modes become `Exact` and it is
//! marked measured. Measuring it again is an error.

use crate::error::{LayoutError, NodeFailure};
use crate::font::FontService;
use crate::model::{LayoutState, Node, NodeKind, TextContent};
use crate::style::{Orientation, SizeMode};
use crate::text::break_lines;

use super::Size;

/// Round a measured text width up to the next whole point.
pub fn round_up_to_unit(width: f64) -> f64 {
    (width + 1.0).floor()
}

/// Resolve one axis of a node from its size mode.
fn resolve_axis(mode: SizeMode, desired: f64, padding: f64, available: f64) -> f64 {
    let resolved = match mode {
        SizeMode::Auto => desired + padding,
        SizeMode::Fill => available,
        SizeMode::Exact(v) => v,
    };
    resolved.max(0.0)
}

pub struct Measurer<'a, F: FontService + ?Sized> {
    fonts: &'a F,
    max_depth: usize,
}

impl<'a, F: FontService + ?Sized> Measurer<'a, F> {
    pub fn new(fonts: &'a F, max_depth: usize) -> Self {
        Self { fonts, max_depth }
    }

    /// Measure `node` and its whole subtree within `max_width` x
    /// `max_height` (the space for its margin box). Returns the node's
    /// desired content size; the resolved size is written to `node.frame`.
    ///
    /// On failure the returned path is relative to `node` (empty when
    /// `node` itself failed).
    pub fn measure(
        &self,
        node: &mut Node,
        max_width: f64,
        max_height: f64,
    ) -> Result<Size, NodeFailure> {
        self.measure_node(node, max_width, max_height, 1)
    }

    fn measure_node(
        &self,
        node: &mut Node,
        max_width: f64,
        max_height: f64,
        depth: usize,
    ) -> Result<Size, NodeFailure> {
        if depth > self.max_depth {
            return Err(NodeFailure::new(
                "",
                LayoutError::invariant(format!("tree is deeper than {} levels", self.max_depth)),
            ));
        }
        if node.state != LayoutState::Unmeasured {
            return Err(NodeFailure::new(
                "",
                LayoutError::invariant("node was already measured"),
            ));
        }

        let available_width = (max_width - node.margin.horizontal()).max(0.0);
        let available_height = (max_height - node.margin.vertical()).max(0.0);

        let content_width = match node.width {
            SizeMode::Exact(v) => v,
            _ => available_width,
        } - node.padding.horizontal();
        let content_height = match node.height {
            SizeMode::Exact(v) => v,
            _ => available_height,
        } - node.padding.vertical();
        let content_width = content_width.max(0.0);
        let content_height = content_height.max(0.0);

        let desired = match &mut node.kind {
            NodeKind::Text(text) => self
                .measure_text(text, content_width)
                .map_err(|e| NodeFailure::new("", e))?,
            NodeKind::Image(image) => image
                .intrinsic
                .map(|(width, height)| Size { width, height })
                .unwrap_or_default(),
            NodeKind::Stack {
                orientation,
                children,
            } => self.measure_stack(*orientation, children, content_width, content_height, depth)?,
            NodeKind::Overlay { .. } => {
                return Err(NodeFailure::new(
                    "",
                    LayoutError::UnsupportedVariant { variant: "Overlay" },
                ))
            }
        };

        node.frame.width = resolve_axis(
            node.width,
            desired.width,
            node.padding.horizontal(),
            available_width,
        );
        node.frame.height = resolve_axis(
            node.height,
            desired.height,
            node.padding.vertical(),
            available_height,
        );
        node.width = SizeMode::Exact(node.frame.width);
        node.height = SizeMode::Exact(node.frame.height);
        node.state = LayoutState::Measured;

        if !node.children().is_empty() {
            log::debug!(
                "measured {} with {} children: {:.2} x {:.2}",
                node.kind_name(),
                node.children().len(),
                node.frame.width,
                node.frame.height
            );
        }

        Ok(desired)
    }

    fn measure_stack(
        &self,
        orientation: Orientation,
        children: &mut [Node],
        content_width: f64,
        content_height: f64,
        depth: usize,
    ) -> Result<Size, NodeFailure> {
        let mut used = 0.0;
        let mut cross: f64 = 0.0;

        for (i, child) in children.iter_mut().enumerate() {
            let name = child.kind_name();
            let (max_width, max_height) = match orientation {
                Orientation::Vertical => (content_width, content_height - used),
                Orientation::Horizontal => (content_width - used, content_height),
            };
            self.measure_node(child, max_width, max_height, depth + 1)
                .map_err(|f| f.within(&format!("{}[{}]", name, i)))?;

            let (main, other) = match orientation {
                Orientation::Vertical => (child.outer_height(), child.outer_width()),
                Orientation::Horizontal => (child.outer_width(), child.outer_height()),
            };
            used += main;
            cross = cross.max(other);
        }

        Ok(match orientation {
            Orientation::Vertical => Size {
                width: cross,
                height: used,
            },
            Orientation::Horizontal => Size {
                width: used,
                height: cross,
            },
        })
    }

    /// Break the text into lines and size it. A paragraph that had to wrap
    /// wants the whole available width.
    fn measure_text(&self, text: &mut TextContent, content_width: f64) -> Result<Size, LayoutError> {
        let em = self.fonts.em_box(&text.font)?;

        let mut lines = Vec::new();
        let mut widest: f64 = 0.0;
        let mut wrapped = false;
        for line in break_lines(self.fonts, &text.text, content_width, &text.font, text.size) {
            let line = line?;
            wrapped |= line.wrapped;
            if !line.text.is_empty() {
                let w = self.fonts.measure_width(&text.font, line.text, text.size)?;
                widest = widest.max(round_up_to_unit(w));
            }
            lines.push(line.text.to_string());
        }

        let width = if wrapped { content_width } else { widest };
        text.line_height = em.line_height(text.size);
        let height = text.line_height * lines.len() as f64;
        text.lines = lines;

        Ok(Size { width, height })
    }
}
