//! # Document Builder
//!
//! Turns a folio XML document into layout trees, one page at a time.
//!
//! ```xml
//! <Document>
//!   <Font name="Serif" regular="fonts/serif.ttf" bold="fonts/serif-bold.ttf"/>
//!   <Template name="footer">
//!     <TextView text="Page footer" size="8"/>
//!   </Template>
//!   <Page>
//!     <LinearLayout width="fill" height="fill" gravity="center">
//!       <TextView font="Serif" size="24">Hello</TextView>
//!       <ImageView src="logo.png" margin="10"/>
//!       <Include template="footer"/>
//!     </LinearLayout>
//!   </Page>
//! </Document>
//! ```
//!
//! Parsing the XML is all-or-nothing: a malformed document is rejected as a
//! whole. Turning a page's elements into nodes happens per page, so a bad
//! attribute only costs the page it is on. The same goes for a page that is
//! nested too deeply or expands to too many elements: the parser keeps only
//! as much nesting as a page may use, and the builder fails the page.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::config::RenderOptions;
use crate::error::{FolioError, LayoutError, NodeFailure};
use crate::font::{FontContext, FontRef, FontStyle};
use crate::image_loader;
use crate::model::{Edges, Node, NodeKind};
use crate::style::{Gravity, Orientation, SizeMode};

pub const DEFAULT_FONT_FAMILY: &str = "Helvetica";
pub const DEFAULT_FONT_SIZE: f64 = 12.0;

/// An XML element with its attributes, text and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
    /// 1-based source line of the start tag.
    pub line: usize,
    /// Children nested past the parser's depth limit were dropped.
    pub truncated: bool,
}

impl Element {
    fn new(name: String, attributes: Vec<(String, String)>, line: usize) -> Self {
        Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
            line,
            truncated: false,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// A `<Font>` declaration: one family, up to four style files.
#[derive(Debug, Clone, PartialEq)]
pub struct FontDecl {
    pub family: String,
    pub files: Vec<(FontStyle, PathBuf)>,
    pub line: usize,
}

/// One `<Page>` of a document, not yet built.
#[derive(Debug, Clone)]
pub struct PageSource {
    pub index: usize,
    pub line: usize,
    content: Vec<Element>,
}

/// A parsed folio document.
#[derive(Debug, Clone)]
pub struct Document {
    base_dir: PathBuf,
    fonts: Vec<FontDecl>,
    templates: HashMap<String, Element>,
    pages: Vec<PageSource>,
    max_depth: usize,
    max_elements: usize,
}

/// Running state while one page is expanded into nodes.
#[derive(Default)]
struct Expansion {
    /// Templates currently being included, outermost first.
    including: Vec<String>,
    /// Views and includes entered on the current path.
    depth: usize,
    /// Elements visited so far on this page.
    elements: usize,
}

impl Document {
    /// Parse a document. Relative font and image paths resolve against
    /// `base_dir`; nesting and expansion limits come from `options`.
    pub fn parse(xml: &str, base_dir: &Path, options: &RenderOptions) -> Result<Self, FolioError> {
        // <Document> and <Page> sit above a page's views.
        let root = parse_elements(xml, options.max_depth.saturating_add(2))?;
        if root.name != "Document" {
            return Err(FolioError::Xml {
                line: root.line,
                message: format!("root element must be <Document>, found <{}>", root.name),
            });
        }

        let mut document = Document {
            base_dir: base_dir.to_path_buf(),
            fonts: Vec::new(),
            templates: HashMap::new(),
            pages: Vec::new(),
            max_depth: options.max_depth,
            max_elements: options.max_elements,
        };

        for child in root.children {
            match child.name.as_str() {
                "Font" => {
                    let decl = font_decl(&child, base_dir)?;
                    document.fonts.push(decl);
                }
                "Template" => {
                    let name = child.attr("name").ok_or_else(|| FolioError::Xml {
                        line: child.line,
                        message: "<Template> needs a name".to_string(),
                    })?;
                    document.templates.insert(name.to_string(), child.clone());
                }
                "Page" => {
                    let index = document.pages.len();
                    document.pages.push(PageSource {
                        index,
                        line: child.line,
                        content: child.children,
                    });
                }
                other => log::warn!("Ignoring unknown element <{}> on line {}", other, child.line),
            }
        }

        Ok(document)
    }

    pub fn pages(&self) -> &[PageSource] {
        &self.pages
    }

    pub fn fonts(&self) -> &[FontDecl] {
        &self.fonts
    }

    /// Load every declared font file into `fonts`.
    pub fn register_fonts(&self, fonts: &mut FontContext) -> Result<(), FolioError> {
        for decl in &self.fonts {
            for (style, path) in &decl.files {
                fonts.load_font_file(&decl.family, *style, path)?;
            }
        }
        Ok(())
    }

    /// Build the node tree of one page. A page holds exactly one root view.
    ///
    /// Failure paths are relative to the page and use element names.
    pub fn build_page(&self, page: &PageSource) -> Result<Node, NodeFailure> {
        let mut views = Vec::new();
        let mut expansion = Expansion::default();
        for (i, element) in page.content.iter().enumerate() {
            self.build_into(element, i, &mut views, &mut expansion)?;
        }
        if views.len() != 1 {
            return Err(NodeFailure::new(
                "",
                LayoutError::invariant(format!(
                    "a page must contain exactly one view, found {}",
                    views.len()
                )),
            ));
        }
        Ok(views.remove(0))
    }

    /// Build `element` and push the resulting node(s) onto `out`. Includes
    /// expand in place; unknown elements produce nothing.
    fn build_into(
        &self,
        element: &Element,
        index: usize,
        out: &mut Vec<Node>,
        expansion: &mut Expansion,
    ) -> Result<(), NodeFailure> {
        let segment = format!("{}[{}]", element.name, index);
        expansion.elements += 1;
        if expansion.elements > self.max_elements {
            return Err(NodeFailure::new(
                &segment,
                LayoutError::invariant(format!(
                    "page expands to more than {} elements",
                    self.max_elements
                )),
            ));
        }

        match element.name.as_str() {
            "Include" | "TextView" | "ImageView" | "LinearLayout" | "FrameLayout" => {
                if expansion.depth >= self.max_depth {
                    return Err(NodeFailure::new(&segment, self.too_deep()));
                }
                expansion.depth += 1;
                let result = self.build_nested(element, &segment, out, expansion);
                expansion.depth -= 1;
                result
            }
            other => {
                log::warn!("Ignoring unknown element <{}> on line {}", other, element.line);
                Ok(())
            }
        }
    }

    fn too_deep(&self) -> LayoutError {
        LayoutError::invariant(format!("page is nested deeper than {} levels", self.max_depth))
    }

    /// Expand an `Include`, or build one view, one level further down.
    fn build_nested(
        &self,
        element: &Element,
        segment: &str,
        out: &mut Vec<Node>,
        expansion: &mut Expansion,
    ) -> Result<(), NodeFailure> {
        match element.name.as_str() {
            "Include" => {
                let name = element.attr("template").ok_or_else(|| {
                    NodeFailure::new(segment, LayoutError::invariant("<Include> needs a template"))
                })?;
                if expansion.including.iter().any(|t| t == name) {
                    return Err(NodeFailure::new(
                        segment,
                        LayoutError::invariant(format!("template '{}' includes itself", name)),
                    ));
                }
                let template = self.templates.get(name).ok_or_else(|| {
                    NodeFailure::new(
                        segment,
                        LayoutError::invariant(format!("no template named '{}'", name)),
                    )
                })?;
                expansion.including.push(name.to_string());
                for (i, child) in template.children.iter().enumerate() {
                    self.build_into(child, i, out, expansion)
                        .map_err(|f| f.within(segment))?;
                }
                expansion.including.pop();
                Ok(())
            }
            _ => {
                let node = self
                    .build_view(element, expansion)
                    .map_err(|f| f.within(segment))?;
                out.push(node);
                Ok(())
            }
        }
    }

    fn build_view(&self, element: &Element, expansion: &mut Expansion) -> Result<Node, NodeFailure> {
        let here = |e: LayoutError| NodeFailure::new("", e);

        let node = match element.name.as_str() {
            "TextView" => {
                let text = element.attr("text").unwrap_or(&element.text);
                let family = element.attr("font").unwrap_or(DEFAULT_FONT_FAMILY);
                let style: FontStyle = element.attr("style").unwrap_or("").parse().map_err(here)?;
                let size = match element.attr("size") {
                    Some(v) => parse_points("size", v).map_err(here)?,
                    None => DEFAULT_FONT_SIZE,
                };
                Node::text(text, FontRef::new(family, style), size)
            }
            "ImageView" => {
                let src = element
                    .attr("src")
                    .ok_or_else(|| here(LayoutError::invariant("<ImageView> needs a src")))?;
                let mut node = Node::image(src, None);
                match image_loader::load_image(src, &self.base_dir) {
                    Ok(loaded) => {
                        if let NodeKind::Image(image) = &mut node.kind {
                            image.intrinsic = Some(loaded.intrinsic_size());
                            image.data = Some(Arc::new(loaded));
                        }
                    }
                    Err(e) => log::warn!("Image '{}' on line {}: {}", src, element.line, e),
                }
                node
            }
            "LinearLayout" | "FrameLayout" => {
                if element.truncated {
                    return Err(here(self.too_deep()));
                }
                let mut children = Vec::new();
                for (i, child) in element.children.iter().enumerate() {
                    self.build_into(child, i, &mut children, expansion)?;
                }
                if element.name == "LinearLayout" {
                    let orientation: Orientation = element
                        .attr("orientation")
                        .unwrap_or("vertical")
                        .parse()
                        .map_err(here)?;
                    Node::stack(orientation, children)
                } else {
                    Node::overlay(children)
                }
            }
            other => {
                return Err(here(LayoutError::invariant(format!(
                    "<{}> is not a view",
                    other
                ))))
            }
        };

        let width: SizeMode = element.attr("width").unwrap_or("auto").parse().map_err(here)?;
        let height: SizeMode = element.attr("height").unwrap_or("auto").parse().map_err(here)?;
        let gravity: Gravity = element.attr("gravity").unwrap_or("").parse().map_err(here)?;
        let margin = edges(element, "margin").map_err(here)?;
        let padding = edges(element, "padding").map_err(here)?;

        Ok(node
            .with_size(width, height)
            .with_margin(margin)
            .with_padding(padding)
            .with_gravity(gravity))
    }
}

/// Read `prefix` (uniform) and `prefix_left|top|right|bottom` overrides.
fn edges(element: &Element, prefix: &str) -> Result<Edges, LayoutError> {
    let mut edges = match element.attr(prefix) {
        Some(v) => Edges::uniform(parse_points(prefix, v)?),
        None => Edges::default(),
    };
    let sides: [(&str, &mut f64); 4] = [
        ("top", &mut edges.top),
        ("right", &mut edges.right),
        ("bottom", &mut edges.bottom),
        ("left", &mut edges.left),
    ];
    for (side, slot) in sides {
        let key = format!("{}_{}", prefix, side);
        if let Some(v) = element.attr(&key) {
            *slot = parse_points(&key, v)?;
        }
    }
    Ok(edges)
}

fn parse_points(attribute: &str, value: &str) -> Result<f64, LayoutError> {
    match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(LayoutError::invariant(format!(
            "{} must be a non-negative number, got '{}'",
            attribute, value
        ))),
    }
}

fn font_decl(element: &Element, base_dir: &Path) -> Result<FontDecl, FolioError> {
    let family = element.attr("name").ok_or_else(|| FolioError::Xml {
        line: element.line,
        message: "<Font> needs a name".to_string(),
    })?;
    let files = [
        ("regular", FontStyle::Regular),
        ("bold", FontStyle::Bold),
        ("italic", FontStyle::Italic),
        ("bolditalic", FontStyle::BoldItalic),
    ]
    .into_iter()
    .filter_map(|(key, style)| element.attr(key).map(|path| (style, base_dir.join(path))))
    .collect();

    Ok(FontDecl {
        family: family.to_string(),
        files,
        line: element.line,
    })
}

/// Counts newlines incrementally so line lookups stay linear.
struct LineTracker<'a> {
    source: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineTracker<'a> {
    fn line_at(&mut self, position: usize) -> usize {
        let position = position.min(self.source.len());
        if position > self.offset {
            self.line += self.source[self.offset..position]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.offset = position;
        }
        self.line
    }
}

/// Parse XML into an element tree. Whitespace-only text is dropped.
///
/// Elements nested more than `max_depth` deep are still checked for
/// well-formedness but not kept; their closest kept ancestor is marked
/// `truncated` instead.
pub fn parse_elements(xml: &str, max_depth: usize) -> Result<Element, FolioError> {
    let mut reader = Reader::from_str(xml);
    let mut lines = LineTracker {
        source: xml.as_bytes(),
        offset: 0,
        line: 1,
    };
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    // Open elements below the depth limit.
    let mut skipped = 0usize;

    loop {
        // Position before the event is where its tag starts.
        let start = reader.buffer_position() as usize;
        let event = reader.read_event_into(&mut buf).map_err(|e| FolioError::Xml {
            line: lines.line_at(reader.buffer_position() as usize),
            message: e.to_string(),
        })?;
        let line = lines.line_at(start) + leading_newlines(&xml.as_bytes()[start.min(xml.len())..]);

        let too_deep = skipped > 0 || stack.len() >= max_depth;
        match event {
            Event::Start(_) | Event::Empty(_) if too_deep => {
                if skipped == 0 {
                    if let Some(parent) = stack.last_mut() {
                        parent.truncated = true;
                    }
                }
                if matches!(event, Event::Start(_)) {
                    skipped += 1;
                }
            }
            Event::Start(e) => {
                stack.push(start_element(&e, line)?);
            }
            Event::Empty(e) => {
                let element = start_element(&e, line)?;
                attach(&mut stack, &mut root, element, line)?;
            }
            Event::End(_) if skipped > 0 => skipped -= 1,
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element, line)?;
                }
            }
            Event::Text(_) | Event::CData(_) if skipped > 0 => {}
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| FolioError::Xml {
                    line,
                    message: e.to_string(),
                })?;
                if let Some(current) = stack.last_mut() {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        if !current.text.is_empty() {
                            current.text.push(' ');
                        }
                        current.text.push_str(trimmed);
                    }
                }
            }
            Event::CData(t) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(FolioError::Xml {
            line: open.line,
            message: format!("<{}> is never closed", open.name),
        });
    }
    root.ok_or_else(|| FolioError::Xml {
        line: 1,
        message: "document is empty".to_string(),
    })
}

/// Whitespace skipped before a tag still belongs to the previous event.
fn leading_newlines(rest: &[u8]) -> usize {
    rest.iter()
        .take_while(|b| b.is_ascii_whitespace())
        .filter(|&&b| b == b'\n')
        .count()
}

fn start_element(e: &BytesStart, line: usize) -> Result<Element, FolioError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| FolioError::Xml {
            line,
            message: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| FolioError::Xml {
                line,
                message: err.to_string(),
            })?
            .to_string();
        attributes.push((key, value));
    }
    Ok(Element::new(name, attributes, line))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
    line: usize,
) -> Result<(), FolioError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(FolioError::Xml {
                line,
                message: format!("unexpected second root element <{}>", element.name),
            })
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::Align;

    fn parse(xml: &str) -> Document {
        Document::parse(xml, Path::new("."), &RenderOptions::default()).unwrap()
    }

    fn nested_layouts(depth: usize) -> String {
        format!(
            "{}<TextView text=\"deep\"/>{}",
            "<LinearLayout>".repeat(depth),
            "</LinearLayout>".repeat(depth)
        )
    }

    fn only_page(xml: &str) -> Result<Node, NodeFailure> {
        let doc = parse(xml);
        doc.build_page(&doc.pages()[0])
    }

    #[test]
    fn test_element_tree_and_lines() {
        let root = parse_elements("<Document>\n  <Page>\n    <TextView text=\"a &amp; b\"/>\n  </Page>\n</Document>", 16)
            .unwrap();
        assert_eq!(root.name, "Document");
        assert_eq!(root.line, 1);
        let page = &root.children[0];
        assert_eq!(page.line, 2);
        assert_eq!(page.children[0].line, 3);
        assert_eq!(page.children[0].attr("text"), Some("a & b"));
    }

    #[test]
    fn test_rejects_non_document_root() {
        let err = Document::parse("<Page/>", Path::new("."), &RenderOptions::default()).unwrap_err();
        assert!(matches!(err, FolioError::Xml { line: 1, .. }));
    }

    #[test]
    fn test_rejects_mismatched_tags() {
        assert!(parse_elements("<Document><Page></Document>", 16).is_err());
        assert!(parse_elements("", 16).is_err());
        // tags past the depth limit are still checked
        assert!(parse_elements("<a><b><c><d></c></b></a>", 2).is_err());
    }

    #[test]
    fn test_text_view_defaults_and_element_text() {
        let node = only_page("<Document><Page><TextView>\n  Hello  world\n</TextView></Page></Document>")
            .unwrap();
        match &node.kind {
            NodeKind::Text(text) => {
                assert_eq!(text.text, "Hello  world");
                assert_eq!(text.font, FontRef::regular("Helvetica"));
                assert_eq!(text.size, 12.0);
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_linear_layout_attributes() {
        let node = only_page(
            r#"<Document><Page>
                <LinearLayout orientation="horizontal" width="fill" height="200"
                              padding="4" padding_left="9" margin_top="3" gravity="right|center_vertical">
                  <TextView text="a" font="Courier" style="bold" size="10"/>
                  <ImageView src="missing.png"/>
                </LinearLayout>
            </Page></Document>"#,
        )
        .unwrap();
        assert!(matches!(
            node.kind,
            NodeKind::Stack {
                orientation: Orientation::Horizontal,
                ..
            }
        ));
        assert_eq!(node.width, SizeMode::Fill);
        assert_eq!(node.height, SizeMode::Exact(200.0));
        assert_eq!(node.padding.left, 9.0);
        assert_eq!(node.padding.right, 4.0);
        assert_eq!(node.margin.top, 3.0);
        assert_eq!(node.gravity.horizontal(), Align::End);
        assert_eq!(node.gravity.vertical(), Align::Center);
        assert_eq!(node.children().len(), 2);
        match &node.children()[1].kind {
            NodeKind::Image(image) => {
                assert!(image.intrinsic.is_none());
                assert!(image.data.is_none());
            }
            other => panic!("expected image, got {:?}", other),
        }
    }

    #[test]
    fn test_frame_layout_builds_overlay() {
        let node = only_page("<Document><Page><FrameLayout><TextView text=\"x\"/></FrameLayout></Page></Document>")
            .unwrap();
        assert_eq!(node.kind_name(), "Overlay");
    }

    #[test]
    fn test_malformed_size_is_page_local() {
        let doc = parse(
            r#"<Document>
                <Page><LinearLayout><TextView text="x" width="huge"/></LinearLayout></Page>
                <Page><TextView text="fine"/></Page>
            </Document>"#,
        );
        let err = doc.build_page(&doc.pages()[0]).unwrap_err();
        assert_eq!(err.path, "LinearLayout[0]/TextView[0]");
        assert_eq!(
            err.error,
            LayoutError::MalformedSizeRequest {
                token: "huge".to_string()
            }
        );
        assert!(doc.build_page(&doc.pages()[1]).is_ok());
    }

    #[test]
    fn test_page_needs_exactly_one_view() {
        let doc = parse("<Document><Page/><Page><TextView/><TextView/></Page></Document>");
        assert_eq!(doc.pages().len(), 2);
        for page in doc.pages() {
            let err = doc.build_page(page).unwrap_err();
            assert!(matches!(err.error, LayoutError::TreeInvariantViolation { .. }));
        }
    }

    #[test]
    fn test_unknown_elements_are_skipped() {
        let node = only_page(
            "<Document><Blink/><Page><LinearLayout><Marquee/><TextView text=\"x\"/></LinearLayout></Page></Document>",
        )
        .unwrap();
        assert_eq!(node.children().len(), 1);
    }

    #[test]
    fn test_include_expands_template() {
        let node = only_page(
            r#"<Document>
                <Template name="pair"><TextView text="a"/><TextView text="b"/></Template>
                <Page><LinearLayout><Include template="pair"/><Include template="pair"/></LinearLayout></Page>
            </Document>"#,
        )
        .unwrap();
        assert_eq!(node.children().len(), 4);
    }

    #[test]
    fn test_include_errors() {
        let doc = parse(
            r#"<Document>
                <Template name="loop"><LinearLayout><Include template="loop"/></LinearLayout></Template>
                <Page><Include template="loop"/></Page>
                <Page><Include template="nowhere"/></Page>
            </Document>"#,
        );
        let cycle = doc.build_page(&doc.pages()[0]).unwrap_err();
        assert!(cycle.error.to_string().contains("includes itself"));
        assert_eq!(cycle.path, "Include[0]/LinearLayout[0]/Include[0]");
        let missing = doc.build_page(&doc.pages()[1]).unwrap_err();
        assert!(missing.error.to_string().contains("nowhere"));
    }

    #[test]
    fn test_font_declarations_resolve_against_base_dir() {
        let doc = Document::parse(
            r#"<Document><Font name="Serif" regular="serif.ttf" bolditalic="serif-bi.ttf"/></Document>"#,
            Path::new("/docs"),
            &RenderOptions::default(),
        )
        .unwrap();
        let decl = &doc.fonts()[0];
        assert_eq!(decl.family, "Serif");
        assert_eq!(
            decl.files,
            vec![
                (FontStyle::Regular, PathBuf::from("/docs/serif.ttf")),
                (FontStyle::BoldItalic, PathBuf::from("/docs/serif-bi.ttf")),
            ]
        );
    }

    #[test]
    fn test_bad_margin_is_rejected() {
        let err = only_page("<Document><Page><TextView text=\"x\" margin=\"-3\"/></Page></Document>")
            .unwrap_err();
        assert_eq!(err.path, "TextView[0]");
        assert!(matches!(err.error, LayoutError::TreeInvariantViolation { .. }));
    }

    #[test]
    fn test_parser_drops_elements_past_depth_limit() {
        let root = parse_elements("<a><b><c><d/></c></b><e/></a>", 2).unwrap();
        let b = &root.children[0];
        assert!(b.children.is_empty());
        assert!(b.truncated);
        assert!(!root.truncated);
        assert_eq!(root.children[1].name, "e");
    }

    #[test]
    fn test_deep_page_fails_alone() {
        let options = RenderOptions {
            max_depth: 8,
            ..Default::default()
        };
        let xml = format!(
            "<Document><Page>{}</Page><Page>{}</Page></Document>",
            nested_layouts(100),
            nested_layouts(7)
        );
        let doc = Document::parse(&xml, Path::new("."), &options).unwrap();
        let err = doc.build_page(&doc.pages()[0]).unwrap_err();
        assert!(err.error.to_string().contains("deeper than 8 levels"));
        assert_eq!(err.path.matches("LinearLayout").count(), 8);
        // seven layouts plus the text view is exactly the limit
        assert!(doc.build_page(&doc.pages()[1]).is_ok());
    }

    #[test]
    fn test_include_chains_count_toward_depth() {
        let options = RenderOptions {
            max_depth: 4,
            ..Default::default()
        };
        let xml = r#"<Document>
            <Template name="t0"><TextView text="x"/></Template>
            <Template name="t1"><Include template="t0"/></Template>
            <Template name="t2"><Include template="t1"/></Template>
            <Template name="t3"><Include template="t2"/></Template>
            <Page><Include template="t2"/></Page>
            <Page><Include template="t3"/></Page>
        </Document>"#;
        let doc = Document::parse(xml, Path::new("."), &options).unwrap();
        assert!(doc.build_page(&doc.pages()[0]).is_ok());
        let err = doc.build_page(&doc.pages()[1]).unwrap_err();
        assert!(matches!(err.error, LayoutError::TreeInvariantViolation { .. }));
    }

    #[test]
    fn test_exponential_includes_hit_element_cap() {
        let mut xml = String::from("<Document><Template name=\"t0\"><TextView text=\"x\"/></Template>");
        for i in 1..30 {
            xml.push_str(&format!(
                "<Template name=\"t{i}\"><Include template=\"t{p}\"/><Include template=\"t{p}\"/></Template>",
                i = i,
                p = i - 1
            ));
        }
        xml.push_str("<Page><LinearLayout><Include template=\"t29\"/></LinearLayout></Page>");
        xml.push_str("<Page><TextView text=\"fine\"/></Page></Document>");

        let doc = parse(&xml);
        let err = doc.build_page(&doc.pages()[0]).unwrap_err();
        assert!(err.error.to_string().contains("more than 50000 elements"));
        assert!(doc.build_page(&doc.pages()[1]).is_ok());
    }
}
