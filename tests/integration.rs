//! Integration tests for the folio pipeline.
//!
//! These drive the public API end to end: XML in, laid-out trees and PDF
//! out, using the built-in Courier and Helvetica metrics. They verify:
//! - text measurement and wrapping against real font metrics
//! - stack sizing along both axes
//! - gravity, including the override rules
//! - subtree translation
//! - page-level failure isolation

use std::path::Path;

use folio::font::{FontContext, FontRef, FontService};
use folio::layout::{offset_position, LayoutEngine};
use folio::model::{Edges, Node, NodeKind, PageSize};
use folio::style::{Gravity, Orientation, SizeMode};
use folio::{render_xml, LayoutError, RenderOptions, Renderer};

// ─── Helpers ────────────────────────────────────────────────────

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Courier advances 600/1000 em per character: 6pt at 10pt.
fn courier(content: &str) -> Node {
    Node::text(content, FontRef::regular("Courier"), 10.0)
}

fn block(width: f64, height: f64) -> Node {
    Node::image("block", Some((width, height)))
}

fn lines_of(node: &Node) -> Vec<String> {
    match &node.kind {
        NodeKind::Text(text) => text.lines.clone(),
        other => panic!("expected a TextView, got {:?}", other),
    }
}

fn layout(mut root: Node) -> Node {
    LayoutEngine::default()
        .layout_page(&mut root, &FontContext::new())
        .unwrap();
    root
}

fn layout_on(page_size: PageSize, mut root: Node) -> Node {
    LayoutEngine::new(RenderOptions {
        page_size,
        ..Default::default()
    })
    .layout_page(&mut root, &FontContext::new())
    .unwrap();
    root
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 0.01
}

fn count(haystack: &[u8], needle: &str) -> usize {
    haystack
        .windows(needle.len())
        .filter(|w| *w == needle.as_bytes())
        .count()
}

// ─── Text ───────────────────────────────────────────────────────

#[test]
fn test_fitting_text_is_one_line_rounded_up() {
    let fonts = FontContext::new();
    let font = FontRef::regular("Helvetica");
    let measured = fonts.measure_width(&font, "Hi there", 12.0).unwrap();

    let root = layout(Node::text("Hi there", font, 12.0));
    assert_eq!(lines_of(&root), vec!["Hi there"]);
    assert_eq!(root.frame.width, measured.floor() + 1.0);
    assert!(root.frame.width > measured);
}

#[test]
fn test_scenario_b_breaks_at_the_space() {
    // "aaaaaaaaaa " is 11 chars = 66pt
    let root = layout(
        courier("aaaaaaaaaa bbbbbbbbbb").with_size(SizeMode::Exact(66.0), SizeMode::Auto),
    );
    let lines = lines_of(&root);
    assert_eq!(lines, vec!["aaaaaaaaaa ", "bbbbbbbbbb"]);
    assert!(approx(root.frame.height, 2.0 * 10.55));
}

#[test]
fn test_long_word_breaks_into_ceil_lines() {
    let word = "abcdefghijklmnopqrstuvw";
    // 30pt holds 5 chars
    let root = layout(courier(word).with_size(SizeMode::Exact(30.0), SizeMode::Auto));
    let lines = lines_of(&root);
    assert_eq!(lines.len(), (word.len() + 4) / 5);
    assert!(lines.iter().all(|l| !l.is_empty()));
    assert_eq!(lines.concat(), word);
}

#[test]
fn test_text_filling_its_box_exactly_still_rounds_up() {
    // "abcde" = 30pt in a 30pt stack
    let root = layout(
        Node::stack(Orientation::Vertical, vec![courier("abcde")])
            .with_size(SizeMode::Exact(30.0), SizeMode::Auto),
    );
    let text = &root.children()[0];
    assert_eq!(lines_of(text), vec!["abcde"]);
    assert_eq!(text.frame.width, 31.0);
}

#[test]
fn test_wrapped_text_takes_available_width() {
    let root = layout(Node::stack(
        Orientation::Vertical,
        vec![courier("one two three four five six")],
    )
    .with_size(SizeMode::Exact(100.0), SizeMode::Auto));
    let text = &root.children()[0];
    assert!(lines_of(text).len() > 1);
    assert_eq!(text.frame.width, 100.0);
}

// ─── Stacks ─────────────────────────────────────────────────────

#[test]
fn test_scenario_a_vertical_stack_fill_500() {
    let root = layout_on(
        PageSize::Custom {
            width: 500.0,
            height: 700.0,
        },
        Node::stack(
            Orientation::Vertical,
            vec![courier("short"), courier("a bit longer")],
        )
        .with_size(SizeMode::Fill, SizeMode::Auto),
    );
    assert_eq!(root.frame.width, 500.0);
    let (first, second) = (&root.children()[0], &root.children()[1]);
    assert!(approx(root.frame.height, first.frame.height + second.frame.height));
    assert!(approx(root.frame.height, 21.1));
    // "a bit longer" = 12 * 6 = 72 -> 73
    assert_eq!(first.frame.width, 31.0);
    assert_eq!(second.frame.width, 73.0);
}

#[test]
fn test_stack_sums_margin_boxes_in_both_orientations() {
    let children = || {
        vec![
            block(40.0, 10.0).with_margin(Edges {
                top: 1.0,
                right: 2.0,
                bottom: 3.0,
                left: 4.0,
            }),
            block(20.0, 30.0).with_margin(Edges::uniform(5.0)),
            block(60.0, 5.0),
        ]
    };

    let vertical = layout(Node::stack(Orientation::Vertical, children()));
    // heights: (10+4) + (30+10) + 5
    assert_eq!(vertical.frame.height, 59.0);
    // widths: max(40+6, 20+10, 60)
    assert_eq!(vertical.frame.width, 60.0);

    let horizontal = layout(Node::stack(Orientation::Horizontal, children()));
    // widths: (40+6) + (20+10) + 60
    assert_eq!(horizontal.frame.width, 136.0);
    // heights: max(10+4, 30+10, 5)
    assert_eq!(horizontal.frame.height, 40.0);
}

#[test]
fn test_fill_child_takes_what_siblings_left() {
    let root = layout(
        Node::stack(
            Orientation::Horizontal,
            vec![
                block(100.0, 10.0),
                block(10.0, 10.0).with_size(SizeMode::Fill, SizeMode::Auto),
            ],
        )
        .with_size(SizeMode::Exact(400.0), SizeMode::Auto)
        .with_padding(Edges::uniform(10.0)),
    );
    // 400 - 20 padding - 100 used
    assert_eq!(root.children()[1].frame.width, 280.0);
    assert_eq!(root.children()[1].frame.x, 110.0);
}

// ─── Gravity ────────────────────────────────────────────────────

fn gravity_box(gravity: Gravity) -> Node {
    layout(
        Node::stack(Orientation::Vertical, vec![block(50.0, 20.0)])
            .with_size(SizeMode::Exact(300.0), SizeMode::Exact(200.0))
            .with_padding(Edges::uniform(10.0))
            .with_gravity(gravity),
    )
}

#[test]
fn test_center_horizontal_centers_in_inner_box() {
    let root = gravity_box(Gravity::CENTER_HORIZONTAL);
    let child = &root.children()[0];
    // inner width 280
    assert_eq!(child.frame.x, 10.0 + (280.0 - 50.0) / 2.0);
    assert_eq!(child.frame.y, 10.0);
}

#[test]
fn test_right_overrides_center_horizontal() {
    let root = gravity_box(Gravity::CENTER_HORIZONTAL | Gravity::RIGHT);
    assert_eq!(root.children()[0].frame.x, 10.0 + 280.0 - 50.0);
}

#[test]
fn test_bottom_overrides_center_vertical() {
    let centered = gravity_box(Gravity::CENTER_VERTICAL);
    assert_eq!(centered.children()[0].frame.y, 10.0 + (180.0 - 20.0) / 2.0);

    let bottom = gravity_box(Gravity::CENTER_VERTICAL | Gravity::BOTTOM);
    assert_eq!(bottom.children()[0].frame.y, 10.0 + 180.0 - 20.0);
}

#[test]
fn test_scenario_c_horizontal_bottom_aligns_margin_boxes() {
    let root = layout(
        Node::stack(
            Orientation::Horizontal,
            vec![
                block(10.0, 15.0),
                block(10.0, 40.0).with_margin(Edges {
                    top: 0.0,
                    right: 0.0,
                    bottom: 6.0,
                    left: 0.0,
                }),
                block(10.0, 25.0),
            ],
        )
        .with_size(SizeMode::Exact(300.0), SizeMode::Exact(120.0))
        .with_padding(Edges::uniform(7.0))
        .with_gravity(Gravity::BOTTOM),
    );
    let inner_bottom = root.frame.y + root.frame.height - root.padding.bottom;
    for child in root.children() {
        let margin_bottom = child.frame.y + child.frame.height + child.margin.bottom;
        assert!(approx(margin_bottom, inner_bottom), "{:?}", child.frame);
    }
    // x positions are untouched by vertical gravity
    let xs: Vec<f64> = root.children().iter().map(|c| c.frame.x).collect();
    assert_eq!(xs, vec![7.0, 17.0, 27.0]);
}

#[test]
fn test_right_in_horizontal_stack_offsets_each_child() {
    let root = layout(
        Node::stack(
            Orientation::Horizontal,
            vec![block(50.0, 10.0), block(100.0, 10.0)],
        )
        .with_size(SizeMode::Exact(300.0), SizeMode::Exact(100.0))
        .with_gravity(Gravity::RIGHT),
    );
    let xs: Vec<f64> = root.children().iter().map(|c| c.frame.x).collect();
    assert_eq!(xs, vec![250.0, 250.0]);
}

// ─── Subtree translation ────────────────────────────────────────

fn collect_positions(node: &Node, out: &mut Vec<(f64, f64)>) {
    out.push((node.frame.x, node.frame.y));
    for child in node.children() {
        collect_positions(child, out);
    }
}

#[test]
fn test_offset_moves_every_descendant_once() {
    let mut root = layout(Node::stack(
        Orientation::Vertical,
        vec![
            courier("top"),
            Node::stack(
                Orientation::Horizontal,
                vec![
                    block(5.0, 5.0),
                    Node::stack(Orientation::Vertical, vec![block(3.0, 3.0), courier("x")]),
                ],
            ),
        ],
    ));
    let mut before = Vec::new();
    collect_positions(&root, &mut before);

    offset_position(&mut root, 12.5, -4.0);

    let mut after = Vec::new();
    collect_positions(&root, &mut after);
    assert_eq!(before.len(), root.subtree_len());
    assert_eq!(before.len(), after.len());
    for ((bx, by), (ax, ay)) in before.iter().zip(&after) {
        assert!(approx(ax - bx, 12.5));
        assert!(approx(ay - by, -4.0));
    }
}

// ─── XML to PDF ─────────────────────────────────────────────────

const TWO_PAGES: &str = r#"<Document>
  <Page>
    <LinearLayout width="fill" height="fill" gravity="center" padding="36">
      <TextView font="Courier" size="10">Hello, folio</TextView>
      <TextView text="Second line" style="bold"/>
    </LinearLayout>
  </Page>
  <Page>
    <LinearLayout orientation="horizontal">
      <ImageView src="missing.png" width="50" height="50"/>
      <TextView text="Caption" margin_left="8"/>
    </LinearLayout>
  </Page>
</Document>"#;

#[test]
fn test_render_xml_produces_pdf() {
    init_logging();
    let output = render_xml(TWO_PAGES).unwrap();
    assert!(output.failures.is_empty());
    assert!(output.pdf.starts_with(b"%PDF-1.7"));
    assert_eq!(count(&output.pdf, "/Type /Page "), 2);
    assert_eq!(count(&output.pdf, "/Count 2"), 1);
    assert_eq!(count(&output.pdf, "/BaseFont /Courier "), 1);
    assert_eq!(count(&output.pdf, "/BaseFont /Helvetica-Bold "), 1);
    assert_eq!(count(&output.pdf, "/BaseFont /Helvetica "), 1);
}

#[test]
fn test_xml_layout_is_centered_on_letter() {
    let mut renderer = Renderer::new(RenderOptions::default());
    renderer.add_document(TWO_PAGES, Path::new(".")).unwrap();
    let page = &renderer.pages()[0];
    assert_eq!((page.width, page.height), (612.0, 792.0));

    let root = &page.root;
    assert_eq!(root.frame.width, 612.0);
    let first = &root.children()[0];
    // 12 chars * 6pt = 72 -> 73
    assert_eq!(first.frame.width, 73.0);
    assert!(approx(first.frame.x, 36.0 + (540.0 - 73.0) / 2.0));

    // each child is centred on its own, on top of its cursor position
    let second = &root.children()[1];
    assert!(approx(first.frame.y, 36.0 + (720.0 - first.outer_height()) / 2.0));
    assert!(approx(
        second.frame.y,
        36.0 + first.outer_height() + (720.0 - second.outer_height()) / 2.0
    ));
}

#[test]
fn test_failed_pages_are_skipped_and_reported() {
    init_logging();
    let xml = r#"<Document>
      <Page><TextView text="fine"/></Page>
      <Page>
        <LinearLayout>
          <TextView text="ok"/>
          <TextView text="bad" font="Garamond"/>
        </LinearLayout>
      </Page>
      <Page><FrameLayout><TextView text="over"/></FrameLayout></Page>
      <Page><TextView text="x" width="wide"/></Page>
      <Page><TextView text="also fine"/></Page>
    </Document>"#;

    let output = render_xml(xml).unwrap();
    assert_eq!(count(&output.pdf, "/Type /Page "), 2);

    let failures = output.failures;
    assert_eq!(failures.len(), 3);

    assert_eq!(failures[0].page_index, 1);
    assert_eq!(failures[0].line, 3);
    assert_eq!(failures[0].failure.path, "Page/Stack/TextView[1]");
    assert!(matches!(
        failures[0].failure.error,
        LayoutError::FontMetricsUnavailable { .. }
    ));

    assert_eq!(failures[1].page_index, 2);
    assert_eq!(
        failures[1].failure.error,
        LayoutError::UnsupportedVariant { variant: "Overlay" }
    );

    assert_eq!(failures[2].page_index, 3);
    assert_eq!(failures[2].failure.path, "Page/TextView[0]");
    assert!(matches!(
        failures[2].failure.error,
        LayoutError::MalformedSizeRequest { .. }
    ));
    assert!(failures[2].to_string().starts_with("page 4"));
}

#[test]
fn test_deeply_nested_page_fails_without_taking_the_document_down() {
    init_logging();
    let depth = 5_000;
    let xml = format!(
        "<Document><Page>{}<TextView text=\"deep\"/>{}</Page><Page><TextView text=\"fine\"/></Page></Document>",
        "<LinearLayout>".repeat(depth),
        "</LinearLayout>".repeat(depth)
    );

    let mut renderer = Renderer::new(RenderOptions::default());
    assert_eq!(renderer.add_document(&xml, Path::new(".")).unwrap(), 1);
    let output = renderer.finish().unwrap();
    assert_eq!(count(&output.pdf, "/Type /Page "), 1);
    assert_eq!(output.failures.len(), 1);
    assert_eq!(output.failures[0].page_index, 0);
    assert!(matches!(
        output.failures[0].failure.error,
        LayoutError::TreeInvariantViolation { .. }
    ));
}

#[test]
fn test_malformed_document_is_rejected_whole() {
    assert!(render_xml("<Document><Page>").is_err());
    assert!(render_xml("<Pages/>").is_err());
}

#[test]
fn test_documents_append_to_one_pdf() {
    let mut renderer = Renderer::new(RenderOptions {
        show_bounding_boxes: true,
        ..Default::default()
    });
    assert_eq!(renderer.add_document(TWO_PAGES, Path::new(".")).unwrap(), 2);
    assert_eq!(
        renderer
            .add_document("<Document><Page><TextView text=\"third\"/></Page></Document>", Path::new("."))
            .unwrap(),
        1
    );

    let info = serde_json::to_value(renderer.layout_info()).unwrap();
    assert_eq!(info["pages"].as_array().unwrap().len(), 3);
    assert_eq!(info["pages"][2]["root"]["lines"][0], "third");

    let output = renderer.finish().unwrap();
    assert_eq!(count(&output.pdf, "/Type /Page "), 3);
}
