//! Render options shared by the library entry points and the CLI.

use serde::Deserialize;

use crate::model::PageSize;

/// Default nesting guard for building and laying out a page.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default cap on the elements one page may expand to, templates included.
pub const DEFAULT_MAX_ELEMENTS: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Size of every page. The page root is laid out against the full page.
    pub page_size: PageSize,
    /// Stroke the resolved box of every node.
    pub show_bounding_boxes: bool,
    /// Pages nested deeper than this fail instead of recursing.
    pub max_depth: usize,
    /// Pages that expand to more elements than this fail instead of
    /// building.
    pub max_elements: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::Letter,
            show_bounding_boxes: false,
            max_depth: DEFAULT_MAX_DEPTH,
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RenderOptions::default();
        assert_eq!(options.page_size.dimensions(), (612.0, 792.0));
        assert!(!options.show_bounding_boxes);
        assert_eq!(options.max_depth, 64);
        assert_eq!(options.max_elements, 50_000);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options: RenderOptions =
            serde_json::from_str(r#"{"pageSize": "A4", "showBoundingBoxes": true}"#).unwrap();
        assert_eq!(options.page_size, PageSize::A4);
        assert!(options.show_bounding_boxes);
        assert_eq!(options.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(options.max_elements, DEFAULT_MAX_ELEMENTS);
    }
}
