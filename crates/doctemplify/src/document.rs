/*
 * document.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Structural snapshot of a remote document.
//!
//! Indices are positions in the document's content index space, counted in
//! UTF-16 code units. The body starts at index 1. Every paragraph ends with
//! a newline that occupies one index, tables reserve one index for the
//! table, each row and each cell, and an inline image occupies one index.

use serde::Serialize;

/// Length of `text` in index units.
pub fn index_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// A half-open range `[start_index, end_index)` in the index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRange {
    pub start_index: usize,
    pub end_index: usize,
}

impl IndexRange {
    pub fn new(start_index: usize, end_index: usize) -> Self {
        Self {
            start_index,
            end_index,
        }
    }

    /// The range covering `len` units starting at `start`.
    pub fn at(start: usize, len: usize) -> Self {
        Self::new(start, start + len)
    }

    pub fn len(&self) -> usize {
        self.end_index.saturating_sub(self.start_index)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub document_id: String,
    pub title: String,
    pub body: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Table),
}

impl Block {
    pub fn start_index(&self) -> usize {
        match self {
            Block::Paragraph(p) => p.start_index,
            Block::Table(t) => t.start_index,
        }
    }

    pub fn end_index(&self) -> usize {
        match self {
            Block::Paragraph(p) => p.end_index,
            Block::Table(t) => t.end_index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub start_index: usize,
    pub end_index: usize,
    pub elements: Vec<InlineElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InlineElement {
    Text(TextRun),
    Image(InlineImage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub start_index: usize,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub start_index: usize,
    pub uri: String,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub start_index: usize,
    pub end_index: usize,
    pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub start_index: usize,
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    pub start_index: usize,
    pub end_index: usize,
    pub content: Vec<Block>,
}

impl TableCell {
    /// Index of the first content position inside the cell.
    pub fn content_start(&self) -> Option<usize> {
        self.content.first().map(Block::start_index)
    }
}

impl Table {
    pub fn cell(&self, row: usize, col: usize) -> Option<&TableCell> {
        self.rows.get(row)?.cells.get(col)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, |r| r.cells.len())
    }
}

impl Paragraph {
    /// Concatenated text of the paragraph's runs.
    pub fn text(&self) -> String {
        self.elements
            .iter()
            .filter_map(|e| match e {
                InlineElement::Text(run) => Some(run.content.as_str()),
                InlineElement::Image(_) => None,
            })
            .collect()
    }

    /// First occurrence of `needle` within runs that are contiguous in
    /// the index space.
    fn find(&self, needle: &[u16]) -> Option<IndexRange> {
        let mut span_start = 0;
        let mut span: Vec<u16> = Vec::new();

        for element in &self.elements {
            match element {
                InlineElement::Text(run) => {
                    if span.is_empty() || span_start + span.len() != run.start_index {
                        if let Some(found) = search(&span, needle) {
                            return Some(IndexRange::at(span_start + found, needle.len()));
                        }
                        span.clear();
                        span_start = run.start_index;
                    }
                    span.extend(run.content.encode_utf16());
                }
                InlineElement::Image(_) => {
                    if let Some(found) = search(&span, needle) {
                        return Some(IndexRange::at(span_start + found, needle.len()));
                    }
                    span.clear();
                }
            }
        }

        search(&span, needle).map(|found| IndexRange::at(span_start + found, needle.len()))
    }
}

fn search(haystack: &[u16], needle: &[u16]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

impl Document {
    /// All text in reading order, including table cell text.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        collect_text(&self.body, &mut text);
        text
    }

    /// Index just past the last block of the body.
    pub fn end_index(&self) -> usize {
        self.body.last().map_or(1, Block::end_index)
    }

    /// Top-level tables in document order.
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.body.iter().filter_map(|b| match b {
            Block::Table(t) => Some(t),
            Block::Paragraph(_) => None,
        })
    }

    /// The first table starting at or after `after`.
    ///
    /// A table inserted at index `i` starts at `i` or just after it, so with
    /// `after = i` this is the table that insertion created.
    pub fn locate_table(&self, after: usize) -> Option<&Table> {
        self.tables().find(|t| t.start_index >= after)
    }

    /// Range of the first occurrence of `needle` in any paragraph,
    /// including paragraphs inside table cells.
    pub fn find_text(&self, needle: &str) -> Option<IndexRange> {
        let needle: Vec<u16> = needle.encode_utf16().collect();
        find_in_blocks(&self.body, &needle)
    }

    /// The first inline image starting at or after `after`.
    pub fn find_image(&self, after: usize) -> Option<&InlineImage> {
        let mut images = Vec::new();
        collect_images(&self.body, &mut images);
        images.into_iter().find(|img| img.start_index >= after)
    }
}

fn collect_text(blocks: &[Block], out: &mut String) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.push_str(&p.text()),
            Block::Table(t) => {
                for row in &t.rows {
                    for cell in &row.cells {
                        collect_text(&cell.content, out);
                    }
                }
            }
        }
    }
}

fn find_in_blocks(blocks: &[Block], needle: &[u16]) -> Option<IndexRange> {
    blocks.iter().find_map(|block| match block {
        Block::Paragraph(p) => p.find(needle),
        Block::Table(t) => t
            .rows
            .iter()
            .flat_map(|r| &r.cells)
            .find_map(|c| find_in_blocks(&c.content, needle)),
    })
}

fn collect_images<'a>(blocks: &'a [Block], out: &mut Vec<&'a InlineImage>) {
    for block in blocks {
        match block {
            Block::Paragraph(p) => out.extend(p.elements.iter().filter_map(|e| match e {
                InlineElement::Image(img) => Some(img),
                InlineElement::Text(_) => None,
            })),
            Block::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| &r.cells) {
                    collect_images(&cell.content, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(start_index: usize, content: &str) -> InlineElement {
        InlineElement::Text(TextRun {
            start_index,
            content: content.to_string(),
        })
    }

    fn paragraph(start_index: usize, elements: Vec<InlineElement>) -> Block {
        let len: usize = elements
            .iter()
            .map(|e| match e {
                InlineElement::Text(r) => index_len(&r.content),
                InlineElement::Image(_) => 1,
            })
            .sum();
        Block::Paragraph(Paragraph {
            start_index,
            end_index: start_index + len,
            elements,
        })
    }

    fn sample() -> Document {
        Document {
            document_id: "doc".to_string(),
            title: "Sample".to_string(),
            body: vec![
                paragraph(1, vec![run(1, "Hello "), run(7, "{{name}}\n")]),
                Block::Table(Table {
                    start_index: 16,
                    end_index: 22,
                    rows: vec![TableRow {
                        start_index: 17,
                        cells: vec![TableCell {
                            start_index: 18,
                            end_index: 21,
                            content: vec![paragraph(19, vec![run(19, "x\n")])],
                        }],
                    }],
                }),
                paragraph(22, vec![run(22, "\n")]),
            ],
        }
    }

    #[test]
    fn test_plain_text_includes_table_cells() {
        assert_eq!(sample().plain_text(), "Hello {{name}}\nx\n\n");
    }

    #[test]
    fn test_find_text_spans_adjacent_runs() {
        let doc = sample();
        assert_eq!(doc.find_text("o {{na"), Some(IndexRange::new(5, 11)));
        assert_eq!(doc.find_text("x"), Some(IndexRange::new(19, 20)));
        assert_eq!(doc.find_text("absent"), None);
    }

    #[test]
    fn test_find_text_counts_utf16_units() {
        let doc = Document {
            document_id: "d".into(),
            title: "t".into(),
            body: vec![paragraph(1, vec![run(1, "😀 ok\n")])],
        };
        assert_eq!(doc.find_text("ok"), Some(IndexRange::new(4, 6)));
    }

    #[test]
    fn test_locate_table_after_index() {
        let doc = sample();
        assert_eq!(doc.locate_table(1).map(|t| t.start_index), Some(16));
        assert_eq!(doc.locate_table(16).map(|t| t.start_index), Some(16));
        assert!(doc.locate_table(17).is_none());
        assert_eq!(doc.end_index(), 23);
    }

    #[test]
    fn test_cell_content_start() {
        let doc = sample();
        let table = doc.locate_table(1).unwrap();
        assert_eq!(table.cell(0, 0).and_then(TableCell::content_start), Some(19));
        assert!(table.cell(0, 1).is_none());
        assert_eq!((table.row_count(), table.column_count()), (1, 1));
    }
}
