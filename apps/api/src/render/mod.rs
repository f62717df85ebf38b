//! Markdown → PDF rendering for the document download endpoint.
//!
//! `pulldown-cmark` flattens the document into a small block model (headings,
//! paragraphs, bullets); `printpdf` lays the blocks out on US letter pages
//! with the builtin Helvetica fonts. Line breaking is a greedy word-wrap over
//! an average character width — fidelity is not a goal here, a readable
//! download is.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag};
use thiserror::Error;

use printpdf::{BuiltinFont, Mm, PdfDocument};

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 20.0;
const BULLET_INDENT_MM: f32 = 6.0;
/// Average glyph width in em units, same ballpark as Helvetica body text.
const AVG_CHAR_EM: f32 = 0.5;
const PT_TO_MM: f32 = 0.352_778;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

/// Flattened markdown block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocBlock {
    Heading { level: u8, text: String },
    Paragraph(String),
    Bullet(String),
}

/// Flattens markdown into headings, paragraphs, and bullets.
///
/// Inline emphasis and links are reduced to their text; nested lists are
/// flattened to one bullet level.
pub fn parse_blocks(markdown: &str) -> Vec<DocBlock> {
    let mut blocks = Vec::new();
    let mut buf = String::new();
    let mut heading_level: Option<u8> = None;
    let mut item_depth: u32 = 0;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading(level, _, _)) => {
                heading_level = Some(heading_rank(level));
                buf.clear();
            }
            Event::End(Tag::Heading(_, _, _)) => {
                if let Some(level) = heading_level.take() {
                    push_nonempty(&mut blocks, DocBlock::Heading {
                        level,
                        text: std::mem::take(&mut buf),
                    });
                }
            }
            Event::Start(Tag::Item) => {
                if item_depth > 0 && !buf.trim().is_empty() {
                    // Text of a parent item gathered before its sublist starts.
                    blocks.push(DocBlock::Bullet(std::mem::take(&mut buf)));
                }
                item_depth += 1;
                buf.clear();
            }
            Event::End(Tag::Item) => {
                item_depth = item_depth.saturating_sub(1);
                push_nonempty(&mut blocks, DocBlock::Bullet(std::mem::take(&mut buf)));
            }
            Event::End(Tag::Paragraph) => {
                if item_depth == 0 {
                    push_nonempty(&mut blocks, DocBlock::Paragraph(std::mem::take(&mut buf)));
                }
            }
            Event::Text(t) | Event::Code(t) => buf.push_str(&t),
            Event::SoftBreak | Event::HardBreak => buf.push(' '),
            _ => {}
        }
    }
    // Trailing loose text (e.g. markdown without a closing newline).
    push_nonempty(&mut blocks, DocBlock::Paragraph(buf));
    blocks
}

fn push_nonempty(blocks: &mut Vec<DocBlock>, block: DocBlock) {
    let text = match &block {
        DocBlock::Heading { text, .. } => text,
        DocBlock::Paragraph(text) | DocBlock::Bullet(text) => text,
    };
    if !text.trim().is_empty() {
        blocks.push(block);
    }
}

fn heading_rank(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        _ => 3,
    }
}

/// Renders a markdown document to PDF bytes.
pub fn markdown_to_pdf(title: &str, markdown: &str) -> Result<Vec<u8>, RenderError> {
    let blocks = parse_blocks(markdown);

    let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "body");
    let body_font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    let heading_font = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;

    let mut layer_ref = doc.get_page(page).get_layer(layer);
    let mut cursor_y = PAGE_HEIGHT_MM - MARGIN_MM;

    for block in &blocks {
        let (text, font, size_pt, indent, gap_before) = match block {
            DocBlock::Heading { level: 1, text } => (text, &heading_font, 20.0_f32, 0.0, 6.0),
            DocBlock::Heading { level: 2, text } => (text, &heading_font, 16.0, 0.0, 5.0),
            DocBlock::Heading { text, .. } => (text, &heading_font, 13.0, 0.0, 4.0),
            DocBlock::Paragraph(text) => (text, &body_font, 11.0, 0.0, 3.0),
            DocBlock::Bullet(text) => (text, &body_font, 11.0, BULLET_INDENT_MM, 1.5),
        };

        let line_height = size_pt * 1.4 * PT_TO_MM;
        let usable_width = PAGE_WIDTH_MM - 2.0 * MARGIN_MM - indent;
        let max_chars = (usable_width / (AVG_CHAR_EM * size_pt * PT_TO_MM)).max(1.0) as usize;

        cursor_y -= gap_before;

        for (i, line) in wrap_greedy(text, max_chars).into_iter().enumerate() {
            if cursor_y - line_height < MARGIN_MM {
                let (next_page, next_layer) =
                    doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "body");
                layer_ref = doc.get_page(next_page).get_layer(next_layer);
                cursor_y = PAGE_HEIGHT_MM - MARGIN_MM;
            }
            cursor_y -= line_height;

            let rendered = if matches!(block, DocBlock::Bullet(_)) && i == 0 {
                format!("- {line}")
            } else {
                line
            };
            layer_ref.use_text(
                rendered,
                size_pt,
                Mm(MARGIN_MM + indent),
                Mm(cursor_y),
                font,
            );
        }
    }

    doc.save_to_bytes().map_err(|e| RenderError::Pdf(e.to_string()))
}

/// Greedy word-wrap at a character budget. A single word longer than the
/// budget gets its own line rather than being split.
fn wrap_greedy(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
        } else if current.len() + 1 + word.len() <= max_chars {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
