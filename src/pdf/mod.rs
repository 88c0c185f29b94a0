//! # PDF Serializer
//!
//! Draws laid-out pages into a PDF 1.7 file. Only fully positioned trees
//! reach this stage; every coordinate comes straight from a node's frame.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (fonts, images, pages, content streams)
//! ...
//! xref                <- byte offsets of each object
//! trailer             <- points to the catalog
//! %%EOF
//! ```
//!
//! Layout uses a top-left origin with y growing downward. PDF user space
//! has y growing upward, so every y is flipped against the page height.
//!
//! ## Fonts
//!
//! Helvetica and Courier are referenced as Type1 base fonts with
//! WinAnsiEncoding. Registered TrueType fonts are embedded whole as
//! CIDFontType2 with Identity-H encoding: FontFile2, FontDescriptor,
//! CIDFont, ToUnicode CMap and the Type0 root.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as FmtWrite;
use std::io::Write as IoWrite;

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::error::FolioError;
use crate::font::{FontContext, FontData, FontRef, FontService};
use crate::image_loader::{ImagePixelData, LoadedImage};
use crate::layout::LayoutPage;
use crate::model::{Frame, Node, NodeKind, TextContent};

pub struct PdfWriter {
    show_bounding_boxes: bool,
}

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    objects: Vec<PdfObject>,
    /// Font resources in /F0, /F1, ... order.
    font_objects: Vec<(FontRef, usize)>,
    /// Glyph ids for fonts embedded as CIDFonts.
    custom_glyphs: HashMap<FontRef, HashMap<char, u16>>,
    /// XObject ids, referenced as /Im0, /Im1, ...
    image_objects: Vec<usize>,
    /// (page index, image ordinal within the page) -> index into `image_objects`.
    image_index_map: HashMap<(usize, usize), usize>,
}

struct PdfObject {
    data: Vec<u8>,
}

impl PdfBuilder {
    fn new() -> Self {
        // 0 is the free-list head, 1 the catalog, 2 the page tree.
        Self {
            objects: (0..3).map(|_| PdfObject { data: Vec::new() }).collect(),
            font_objects: Vec::new(),
            custom_glyphs: HashMap::new(),
            image_objects: Vec::new(),
            image_index_map: HashMap::new(),
        }
    }

    fn push(&mut self, data: Vec<u8>) -> usize {
        self.objects.push(PdfObject { data });
        self.objects.len() - 1
    }

    /// Push a FlateDecode stream object. `extra` goes into the dictionary.
    fn push_stream(&mut self, raw: &[u8], extra: &str) -> usize {
        let compressed = compress_to_vec_zlib(raw, 6);
        let mut data: Vec<u8> = Vec::new();
        let _ = write!(
            data,
            "<< /Length {} /Filter /FlateDecode{} >>\nstream\n",
            compressed.len(),
            extra
        );
        data.extend_from_slice(&compressed);
        data.extend_from_slice(b"\nendstream");
        self.push(data)
    }

    fn font_index(&self, font: &FontRef) -> Option<usize> {
        self.font_objects.iter().position(|(f, _)| f == font)
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        Self {
            show_bounding_boxes: false,
        }
    }

    /// Stroke every node's resolved box.
    pub fn with_bounding_boxes(mut self, show: bool) -> Self {
        self.show_bounding_boxes = show;
        self
    }

    /// Write laid-out pages to a PDF byte vector.
    pub fn write(&self, pages: &[LayoutPage], fonts: &FontContext) -> Result<Vec<u8>, FolioError> {
        let mut builder = PdfBuilder::new();

        self.register_fonts(&mut builder, pages, fonts)?;
        self.register_images(&mut builder, pages);

        let mut page_obj_ids: Vec<usize> = Vec::new();
        for (page_idx, page) in pages.iter().enumerate() {
            let content = self.build_content_stream_for_page(page, page_idx, &builder, fonts)?;
            let content_obj_id = builder.push_stream(content.as_bytes(), "");

            let font_resources = builder
                .font_objects
                .iter()
                .enumerate()
                .map(|(i, (_, id))| format!("/F{} {} 0 R", i, id))
                .collect::<Vec<_>>()
                .join(" ");
            let xobject_resources = self.build_xobject_resource_dict(page_idx, &builder);
            let mut resources = format!("/Font << {} >>", font_resources);
            if !xobject_resources.is_empty() {
                let _ = write!(resources, " /XObject << {} >>", xobject_resources);
            }
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << {} >> >>",
                page.width, page.height, content_obj_id, resources
            );
            page_obj_ids.push(builder.push(page_dict.into_bytes()));
        }

        builder.objects[1].data = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        let kids = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2].data = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_obj_ids.len()
        )
        .into_bytes();

        let info_obj_id = builder.push(
            format!(
                "<< /Producer (folio {}) /Creator (folio) >>",
                env!("CARGO_PKG_VERSION")
            )
            .into_bytes(),
        );

        Ok(self.serialize(&builder, info_obj_id))
    }

    fn build_content_stream_for_page(
        &self,
        page: &LayoutPage,
        page_idx: usize,
        builder: &PdfBuilder,
        fonts: &FontContext,
    ) -> Result<String, FolioError> {
        let mut stream = String::new();
        let mut image_counter = 0usize;
        self.write_node(
            &mut stream,
            &page.root,
            page.height,
            builder,
            fonts,
            page_idx,
            &mut image_counter,
        )?;
        Ok(stream)
    }

    #[allow(clippy::too_many_arguments)]
    fn write_node(
        &self,
        stream: &mut String,
        node: &Node,
        page_height: f64,
        builder: &PdfBuilder,
        fonts: &FontContext,
        page_idx: usize,
        image_counter: &mut usize,
    ) -> Result<(), FolioError> {
        let frame = node.frame;
        match &node.kind {
            NodeKind::Text(text) => {
                let origin_x = frame.x + node.padding.left;
                let origin_y = frame.y + node.padding.top;
                self.write_text(stream, text, origin_x, origin_y, page_height, builder, fonts)?;
            }
            NodeKind::Image(image) => {
                let ordinal = *image_counter;
                *image_counter += 1;
                match builder.image_index_map.get(&(page_idx, ordinal)) {
                    Some(img_idx) if image.data.is_some() => {
                        let _ = writeln!(
                            stream,
                            "q\n{:.2} 0 0 {:.2} {:.2} {:.2} cm\n/Im{} Do\nQ",
                            frame.width,
                            frame.height,
                            frame.x,
                            page_height - frame.y - frame.height,
                            img_idx
                        );
                    }
                    _ => Self::write_placeholder(stream, &frame, page_height),
                }
            }
            NodeKind::Stack { children, .. } | NodeKind::Overlay { children } => {
                for child in children {
                    self.write_node(
                        stream,
                        child,
                        page_height,
                        builder,
                        fonts,
                        page_idx,
                        image_counter,
                    )?;
                }
            }
        }

        if self.show_bounding_boxes {
            let _ = writeln!(
                stream,
                "q\n1 0 0 RG\n0.5 w\n{:.2} {:.2} {:.2} {:.2} re\nS\nQ",
                frame.x,
                page_height - frame.y - frame.height,
                frame.width,
                frame.height
            );
        }
        Ok(())
    }

    /// One line per em-box, starting at the content origin.
    #[allow(clippy::too_many_arguments)]
    fn write_text(
        &self,
        stream: &mut String,
        text: &TextContent,
        origin_x: f64,
        origin_y: f64,
        page_height: f64,
        builder: &PdfBuilder,
        fonts: &FontContext,
    ) -> Result<(), FolioError> {
        if text.lines.iter().all(|l| l.is_empty()) {
            return Ok(());
        }
        let font_idx = builder.font_index(&text.font).ok_or_else(|| {
            FolioError::Render(format!("font '{}' was never registered", text.font))
        })?;
        let baseline = fonts
            .em_box(&text.font)
            .map_err(|e| FolioError::Render(e.to_string()))?
            .baseline(text.size);
        let glyphs = builder.custom_glyphs.get(&text.font);

        let _ = writeln!(stream, "BT\n0 0 0 rg\n/F{} {:.2} Tf", font_idx, text.size);
        for (i, line) in text.lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            let line_top = origin_y + i as f64 * text.line_height;
            let pdf_y = page_height - (line_top + baseline);
            let encoded = match glyphs {
                Some(glyphs) => Self::encode_glyph_ids(line, glyphs),
                None => format!("({})", Self::encode_winansi(line)),
            };
            let _ = writeln!(
                stream,
                "1 0 0 1 {:.2} {:.2} Tm\n{} Tj",
                origin_x, pdf_y, encoded
            );
        }
        let _ = writeln!(stream, "ET");
        Ok(())
    }

    fn write_placeholder(stream: &mut String, frame: &Frame, page_height: f64) {
        if frame.width <= 0.0 || frame.height <= 0.0 {
            return;
        }
        let _ = writeln!(
            stream,
            "q\n0.85 0.85 0.85 rg\n{:.2} {:.2} {:.2} {:.2} re\nf\nQ",
            frame.x,
            page_height - frame.y - frame.height,
            frame.width,
            frame.height
        );
    }

    fn register_fonts(
        &self,
        builder: &mut PdfBuilder,
        pages: &[LayoutPage],
        fonts: &FontContext,
    ) -> Result<(), FolioError> {
        let mut font_chars: HashMap<FontRef, HashSet<char>> = HashMap::new();
        for page in pages {
            Self::collect_font_chars(&page.root, &mut font_chars);
        }

        // Sorted for deterministic output.
        let mut keys: Vec<FontRef> = font_chars.keys().cloned().collect();
        keys.sort_by(|a, b| a.to_string().cmp(&b.to_string()));

        for key in keys {
            let data = fonts
                .resolve(&key)
                .map_err(|e| FolioError::Render(e.to_string()))?;
            let obj_id = match data {
                FontData::Standard(std_font) => builder.push(
                    format!(
                        "<< /Type /Font /Subtype /Type1 /BaseFont /{} \
                         /Encoding /WinAnsiEncoding >>",
                        std_font.pdf_name()
                    )
                    .into_bytes(),
                ),
                FontData::Custom { data, .. } => {
                    let used = font_chars.get(&key).cloned().unwrap_or_default();
                    Self::write_custom_font_objects(builder, &key, data, &used)?
                }
            };
            builder.font_objects.push((key, obj_id));
        }
        Ok(())
    }

    fn collect_font_chars(node: &Node, font_chars: &mut HashMap<FontRef, HashSet<char>>) {
        if let NodeKind::Text(text) = &node.kind {
            if text.lines.iter().any(|l| !l.is_empty()) {
                font_chars
                    .entry(text.font.clone())
                    .or_default()
                    .extend(text.lines.iter().flat_map(|l| l.chars()));
            }
        }
        for child in node.children() {
            Self::collect_font_chars(child, font_chars);
        }
    }

    /// Create XObjects for every image with pixels, keyed by page and
    /// ordinal so the content stream walk finds them again.
    fn register_images(&self, builder: &mut PdfBuilder, pages: &[LayoutPage]) {
        for (page_idx, page) in pages.iter().enumerate() {
            let mut ordinal = 0usize;
            Self::collect_images(&page.root, page_idx, &mut ordinal, builder);
        }
    }

    fn collect_images(node: &Node, page_idx: usize, ordinal: &mut usize, builder: &mut PdfBuilder) {
        if let NodeKind::Image(image) = &node.kind {
            if let Some(data) = &image.data {
                let img_idx = builder.image_objects.len();
                let xobj_id = Self::write_image_xobject(builder, data);
                builder.image_objects.push(xobj_id);
                builder.image_index_map.insert((page_idx, *ordinal), img_idx);
            }
            *ordinal += 1;
        }
        for child in node.children() {
            Self::collect_images(child, page_idx, ordinal, builder);
        }
    }

    /// Returns the id of the image XObject. A soft mask is written first
    /// when the image has alpha.
    fn write_image_xobject(builder: &mut PdfBuilder, image: &LoadedImage) -> usize {
        let (w, h) = (image.width_px, image.height_px);
        match &image.pixel_data {
            ImagePixelData::Jpeg { data, color_space } => {
                let mut obj: Vec<u8> = Vec::new();
                let _ = write!(
                    obj,
                    "<< /Type /XObject /Subtype /Image /Width {} /Height {} \
                     /ColorSpace /{} /BitsPerComponent 8 /Filter /DCTDecode \
                     /Length {} >>\nstream\n",
                    w,
                    h,
                    color_space.pdf_name(),
                    data.len()
                );
                obj.extend_from_slice(data);
                obj.extend_from_slice(b"\nendstream");
                builder.push(obj)
            }
            ImagePixelData::Decoded { rgb, alpha } => {
                let smask = alpha.as_ref().map(|alpha| {
                    let dict = format!(
                        " /Type /XObject /Subtype /Image /Width {} /Height {} \
                         /ColorSpace /DeviceGray /BitsPerComponent 8",
                        w, h
                    );
                    builder.push_stream(alpha, &dict)
                });
                let mut dict = format!(
                    " /Type /XObject /Subtype /Image /Width {} /Height {} \
                     /ColorSpace /DeviceRGB /BitsPerComponent 8",
                    w, h
                );
                if let Some(id) = smask {
                    let _ = write!(dict, " /SMask {} 0 R", id);
                }
                builder.push_stream(rgb, &dict)
            }
        }
    }

    fn build_xobject_resource_dict(&self, page_idx: usize, builder: &PdfBuilder) -> String {
        let mut entries: Vec<usize> = builder
            .image_index_map
            .iter()
            .filter(|((p, _), _)| *p == page_idx)
            .map(|(_, &img_idx)| img_idx)
            .collect();
        entries.sort_unstable();
        entries
            .iter()
            .map(|&idx| format!("/Im{} {} 0 R", idx, builder.image_objects[idx]))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Write the five objects of an embedded TrueType font and return the
    /// id of the Type0 root.
    fn write_custom_font_objects(
        builder: &mut PdfBuilder,
        font: &FontRef,
        ttf_data: &[u8],
        used_chars: &HashSet<char>,
    ) -> Result<usize, FolioError> {
        let face = ttf_parser::Face::parse(ttf_data, 0)
            .map_err(|e| FolioError::Font(format!("failed to parse '{}': {}", font, e)))?;

        let char_to_gid: HashMap<char, u16> = used_chars
            .iter()
            .filter_map(|&ch| face.glyph_index(ch).map(|gid| (ch, gid.0)))
            .collect();

        let pdf_font_name = Self::sanitize_font_name(font);
        let scale = 1000.0 / face.units_per_em() as f64;

        let fontfile2_id =
            builder.push_stream(ttf_data, &format!(" /Length1 {}", ttf_data.len()));

        let bbox = face.global_bounding_box();
        let ascender = face.ascender();
        let descriptor = format!(
            "<< /Type /FontDescriptor /FontName /{} /Flags 4 \
             /FontBBox [{} {} {} {}] /ItalicAngle {} \
             /Ascent {} /Descent {} /CapHeight {} /StemV {} \
             /FontFile2 {} 0 R >>",
            pdf_font_name,
            (bbox.x_min as f64 * scale) as i32,
            (bbox.y_min as f64 * scale) as i32,
            (bbox.x_max as f64 * scale) as i32,
            (bbox.y_max as f64 * scale) as i32,
            if font.style.is_italic() { -12 } else { 0 },
            (ascender as f64 * scale) as i32,
            (face.descender() as f64 * scale) as i32,
            (face.capital_height().unwrap_or(ascender) as f64 * scale) as i32,
            if font.style.is_bold() { 120 } else { 80 },
            fontfile2_id,
        );
        let descriptor_id = builder.push(descriptor.into_bytes());

        let default_width = face
            .glyph_hor_advance(ttf_parser::GlyphId(0))
            .map(|adv| (adv as f64 * scale) as u32)
            .unwrap_or(1000);
        let cidfont = format!(
            "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} \
             /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
             /FontDescriptor {} 0 R /DW {} /W {} /CIDToGIDMap /Identity >>",
            pdf_font_name,
            descriptor_id,
            default_width,
            Self::build_w_array(&char_to_gid, &face),
        );
        let cidfont_id = builder.push(cidfont.into_bytes());

        let cmap = Self::build_tounicode_cmap(&char_to_gid, &pdf_font_name);
        let tounicode_id = builder.push_stream(cmap.as_bytes(), "");

        let type0 = format!(
            "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H \
             /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
            pdf_font_name, cidfont_id, tounicode_id,
        );
        let type0_id = builder.push(type0.into_bytes());

        builder.custom_glyphs.insert(font.clone(), char_to_gid);
        Ok(type0_id)
    }

    /// `/W` array: `[gid [width] gid [width] ...]`, in glyph order.
    fn build_w_array(char_to_gid: &HashMap<char, u16>, face: &ttf_parser::Face) -> String {
        let scale = 1000.0 / face.units_per_em() as f64;
        let mut gids: Vec<u16> = char_to_gid.values().copied().collect();
        gids.sort_unstable();
        gids.dedup();

        let mut result = String::from("[");
        for gid in gids {
            let advance = face.glyph_hor_advance(ttf_parser::GlyphId(gid)).unwrap_or(0);
            let _ = write!(result, " {} [{}]", gid, (advance as f64 * scale) as u32);
        }
        result.push_str(" ]");
        result
    }

    /// ToUnicode CMap so text can be extracted from embedded fonts.
    fn build_tounicode_cmap(char_to_gid: &HashMap<char, u16>, font_name: &str) -> String {
        let mut gid_to_unicode: Vec<(u16, char)> =
            char_to_gid.iter().map(|(&ch, &gid)| (gid, ch)).collect();
        gid_to_unicode.sort_unstable();

        let mut cmap = String::new();
        cmap.push_str("/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n");
        cmap.push_str("/CIDSystemInfo\n<< /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        let _ = writeln!(cmap, "/CMapName /{}-UTF16 def", font_name);
        cmap.push_str("/CMapType 2 def\n1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

        // At most 100 entries per bfchar block.
        for chunk in gid_to_unicode.chunks(100) {
            let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
            for &(gid, ch) in chunk {
                let mut units = [0u16; 2];
                let utf16: String = ch
                    .encode_utf16(&mut units)
                    .iter()
                    .map(|u| format!("{:04X}", u))
                    .collect();
                let _ = writeln!(cmap, "<{:04X}> <{}>", gid, utf16);
            }
            cmap.push_str("endbfchar\n");
        }

        cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
        cmap
    }

    /// PDF name for an embedded font: the font reference without anything
    /// that is not allowed in a name object.
    fn sanitize_font_name(font: &FontRef) -> String {
        let name: String = font
            .to_string()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if name.is_empty() {
            "CustomFont".to_string()
        } else {
            name
        }
    }

    fn encode_glyph_ids(line: &str, glyphs: &HashMap<char, u16>) -> String {
        let mut hex = String::from("<");
        for ch in line.chars() {
            let _ = write!(hex, "{:04X}", glyphs.get(&ch).copied().unwrap_or(0));
        }
        hex.push('>');
        hex
    }

    /// Encode a line as the body of a PDF literal string in WinAnsi.
    /// Bytes above 0x7E are written as octal escapes; characters outside
    /// WinAnsi become `?`.
    fn encode_winansi(line: &str) -> String {
        let mut out = String::with_capacity(line.len());
        for ch in line.chars() {
            match Self::unicode_to_winansi(ch).unwrap_or(b'?') {
                b'(' => out.push_str("\\("),
                b')' => out.push_str("\\)"),
                b'\\' => out.push_str("\\\\"),
                byte @ 0x20..=0x7E => out.push(byte as char),
                byte => {
                    let _ = write!(out, "\\{:03o}", byte);
                }
            }
        }
        out
    }

    /// Map a character to its WinAnsiEncoding (Windows-1252) byte.
    fn unicode_to_winansi(ch: char) -> Option<u8> {
        let cp = ch as u32;
        if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
            return Some(cp as u8);
        }
        match cp {
            0x20AC => Some(0x80),
            0x201A => Some(0x82),
            0x0192 => Some(0x83),
            0x201E => Some(0x84),
            0x2026 => Some(0x85),
            0x2020 => Some(0x86),
            0x2021 => Some(0x87),
            0x02C6 => Some(0x88),
            0x2030 => Some(0x89),
            0x0160 => Some(0x8A),
            0x2039 => Some(0x8B),
            0x0152 => Some(0x8C),
            0x017D => Some(0x8E),
            0x2018 => Some(0x91),
            0x2019 => Some(0x92),
            0x201C => Some(0x93),
            0x201D => Some(0x94),
            0x2022 => Some(0x95),
            0x2013 => Some(0x96),
            0x2014 => Some(0x97),
            0x02DC => Some(0x98),
            0x2122 => Some(0x99),
            0x0161 => Some(0x9A),
            0x203A => Some(0x9B),
            0x0153 => Some(0x9C),
            0x017E => Some(0x9E),
            0x0178 => Some(0x9F),
            _ => None,
        }
    }

    fn serialize(&self, builder: &PdfBuilder, info_obj_id: usize) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; builder.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in builder.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(&obj.data);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", builder.objects.len());
        output.extend_from_slice(b"0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            builder.objects.len(),
            info_obj_id,
            xref_offset
        );

        output
    }
}
