//! # Positioning
//!
//! Top-down placement of a measured tree. A node is placed at the origin of
//! its margin box; stacks walk a cursor along their main axis, then apply
//! gravity in a second pass by translating each child's whole subtree.
//!
//! Gravity is measured against each child alone, on both axes: a centred
//! child moves by `(inner - child) / 2`, a right or bottom one by
//! `inner - child`.

use crate::error::{LayoutError, NodeFailure};
use crate::model::{Frame, LayoutState, Node, NodeKind};
use crate::style::{Gravity, Orientation};

/// Place `node` with its margin box starting at (`x`, `y`) and position
/// its subtree. The node must already be measured.
pub fn position(node: &mut Node, x: f64, y: f64) -> Result<(), NodeFailure> {
    if node.state == LayoutState::Unmeasured {
        return Err(NodeFailure::new(
            "",
            LayoutError::invariant("node positioned before it was measured"),
        ));
    }

    node.frame.x = x + node.margin.left;
    node.frame.y = y + node.margin.top;

    let Node {
        kind,
        frame,
        padding,
        gravity,
        state,
        ..
    } = node;

    match kind {
        NodeKind::Text(_) | NodeKind::Image(_) => {}
        NodeKind::Stack {
            orientation,
            children,
        } => {
            let inner = Frame {
                x: frame.x + padding.left,
                y: frame.y + padding.top,
                width: (frame.width - padding.horizontal()).max(0.0),
                height: (frame.height - padding.vertical()).max(0.0),
            };
            position_stack(*orientation, *gravity, inner, children)?;
        }
        NodeKind::Overlay { .. } => {
            return Err(NodeFailure::new(
                "",
                LayoutError::UnsupportedVariant { variant: "Overlay" },
            ))
        }
    }

    *state = LayoutState::Positioned;
    Ok(())
}

fn position_stack(
    orientation: Orientation,
    gravity: Gravity,
    inner: Frame,
    children: &mut [Node],
) -> Result<(), NodeFailure> {
    let mut cursor = 0.0;
    for (i, child) in children.iter_mut().enumerate() {
        let name = child.kind_name();
        let (x, y) = match orientation {
            Orientation::Vertical => (inner.x, inner.y + cursor),
            Orientation::Horizontal => (inner.x + cursor, inner.y),
        };
        position(child, x, y).map_err(|f| f.within(&format!("{}[{}]", name, i)))?;
        cursor += match orientation {
            Orientation::Vertical => child.outer_height(),
            Orientation::Horizontal => child.outer_width(),
        };
    }

    if gravity.is_empty() {
        return Ok(());
    }

    // Offsets are computed per child on both axes and added to where the
    // cursor pass left it, so along the main axis later children keep
    // their cursor advance on top of the gravity offset.
    for child in children.iter_mut() {
        let dx = gravity.horizontal().offset(inner.width, child.outer_width());
        let dy = gravity.vertical().offset(inner.height, child.outer_height());
        if dx != 0.0 || dy != 0.0 {
            log::debug!(
                "gravity {:?} moves {} by ({:.2}, {:.2})",
                gravity,
                child.kind_name(),
                dx,
                dy
            );
            offset_position(child, dx, dy);
        }
    }

    Ok(())
}

/// Translate `node` and every descendant by (`dx`, `dy`).
pub fn offset_position(node: &mut Node, dx: f64, dy: f64) {
    node.frame.x += dx;
    node.frame.y += dy;
    for child in node.children_mut() {
        offset_position(child, dx, dy);
    }
}
