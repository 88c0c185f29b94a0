//! # Layout Style
//!
//! The per-node layout requests a document carries: how each axis is sized,
//! which way a stack runs, and how children are aligned inside it.
//!
//! This is deliberately tiny. A node says `auto`, `fill` or a number for each
//! axis, and optionally a gravity. Everything else is derived by the layout
//! passes.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Policy for resolving one dimension of a node.
///
/// After measurement every node holds `Exact` on both axes. That transition
/// is one-way: a measured tree is never measured again.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum SizeMode {
    /// Size to content, plus padding.
    #[default]
    Auto,
    /// Take all the space the parent offers (after margins).
    Fill,
    /// A fixed size in points.
    Exact(f64),
}

impl FromStr for SizeMode {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        match token.to_ascii_lowercase().as_str() {
            "auto" | "wrap_content" => Ok(SizeMode::Auto),
            "fill" | "match_parent" => Ok(SizeMode::Fill),
            _ => match token.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => Ok(SizeMode::Exact(v)),
                _ => Err(LayoutError::MalformedSizeRequest {
                    token: token.to_string(),
                }),
            },
        }
    }
}

/// Direction a stack places its children in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Vertical,
    Horizontal,
}

impl FromStr for Orientation {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vertical" => Ok(Orientation::Vertical),
            "horizontal" => Ok(Orientation::Horizontal),
            other => Err(LayoutError::invariant(format!(
                "unknown orientation '{}'",
                other
            ))),
        }
    }
}

/// Alignment flags for the children of a container.
///
/// Flags combine with `|`, but they do not blend: `RIGHT` wins over
/// `CENTER_HORIZONTAL` and `BOTTOM` wins over `CENTER_VERTICAL`. Use
/// [`Gravity::horizontal`] and [`Gravity::vertical`] to read the effective
/// alignment instead of testing bits directly.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Gravity(u8);

impl Gravity {
    pub const NONE: Gravity = Gravity(0);
    pub const CENTER_HORIZONTAL: Gravity = Gravity(1);
    pub const CENTER_VERTICAL: Gravity = Gravity(1 << 1);
    pub const RIGHT: Gravity = Gravity(1 << 2);
    pub const BOTTOM: Gravity = Gravity(1 << 3);
    pub const CENTER: Gravity = Gravity(1 | 1 << 1);

    pub fn contains(self, other: Gravity) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Effective horizontal alignment.
    pub fn horizontal(self) -> Align {
        if self.contains(Gravity::RIGHT) {
            Align::End
        } else if self.contains(Gravity::CENTER_HORIZONTAL) {
            Align::Center
        } else {
            Align::Start
        }
    }

    /// Effective vertical alignment.
    pub fn vertical(self) -> Align {
        if self.contains(Gravity::BOTTOM) {
            Align::End
        } else if self.contains(Gravity::CENTER_VERTICAL) {
            Align::Center
        } else {
            Align::Start
        }
    }
}

impl BitOr for Gravity {
    type Output = Gravity;

    fn bitor(self, rhs: Gravity) -> Gravity {
        Gravity(self.0 | rhs.0)
    }
}

impl fmt::Debug for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Gravity::CENTER_HORIZONTAL, "CENTER_HORIZONTAL"),
            (Gravity::CENTER_VERTICAL, "CENTER_VERTICAL"),
            (Gravity::RIGHT, "RIGHT"),
            (Gravity::BOTTOM, "BOTTOM"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "Gravity(NONE)")
        } else {
            write!(f, "Gravity({})", set.join(" | "))
        }
    }
}

impl FromStr for Gravity {
    type Err = LayoutError;

    /// Parse `|`-separated flag names, e.g. `center_horizontal|bottom`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut gravity = Gravity::NONE;
        for part in s.split('|').map(str::trim).filter(|p| !p.is_empty()) {
            gravity = gravity
                | match part.to_ascii_lowercase().as_str() {
                    "center" => Gravity::CENTER,
                    "center_horizontal" => Gravity::CENTER_HORIZONTAL,
                    "center_vertical" => Gravity::CENTER_VERTICAL,
                    "right" => Gravity::RIGHT,
                    "bottom" => Gravity::BOTTOM,
                    "left" | "top" => Gravity::NONE,
                    other => {
                        return Err(LayoutError::invariant(format!(
                            "unknown gravity '{}'",
                            other
                        )))
                    }
                };
        }
        Ok(gravity)
    }
}

/// Resolved alignment along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Start,
    Center,
    End,
}

impl Align {
    /// Offset that places `extent` inside `available` with this alignment.
    pub fn offset(self, available: f64, extent: f64) -> f64 {
        match self {
            Align::Start => 0.0,
            Align::Center => (available - extent) / 2.0,
            Align::End => available - extent,
        }
    }
}
