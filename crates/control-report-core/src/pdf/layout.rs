//! Block flow layout.
//!
//! A document is a sequence of [`Block`]s poured top to bottom into the frame
//! of a [`PageGeometry`]. When a block does not fit in what is left of the
//! current page, the page is finished and the block moves to a fresh one:
//!
//! - tables split between rows (rows joined by a row span stay together)
//! - a table row taller than a whole page splits between lines, every text
//!   cell resuming on the next page, as do standalone paragraphs
//! - rows joined by a row span that are taller than a page lose trailing lines
//!   from their tallest cells until they fit
//! - a line or image that cannot fit on an empty page is a layout error
//!
//! # Page Emission
//!
//! Every finished page passes through the [`PageDecorator`]s, in order,
//! before it is stored. This is the only place where per-page marks (such as
//! the identifier stamp) are drawn, so no page can leave the flow without
//! them.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use super::canvas::{Canvas, Color, TextSegment};
use super::fonts::StandardFont;
use super::geometry::PageGeometry;

/// Slack for floating point comparisons (points).
const EPSILON: f32 = 0.01;

/// Gap between options of a choice group.
const CHOICE_GAP: f32 = 14.0;

/// Gap between a choice box and its label.
const CHOICE_BOX_GAP: f32 = 3.0;

// =============================================================================
// Text
// =============================================================================

/// Horizontal alignment of paragraph lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    /// Stretch every line but the last of each paragraph to the full width
    Justify,
}

/// Vertical alignment of cell content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VAlign {
    Top,
    #[default]
    Middle,
}

/// Size, leading, alignment and color of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
    pub leading: f32,
    pub align: Align,
    pub color: Color,
}

impl TextStyle {
    pub const fn new(size: f32, leading: f32) -> Self {
        Self {
            size,
            leading,
            align: Align::Left,
            color: Color::BLACK,
        }
    }

    #[must_use]
    pub const fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    #[must_use]
    pub const fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

/// Text drawn in a single font. `\n` forces a line break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub font: StandardFont,
}

impl Run {
    pub fn new(text: impl Into<String>, font: StandardFont) -> Self {
        Self {
            text: text.into(),
            font,
        }
    }

    pub fn regular(text: impl Into<String>) -> Self {
        Self::new(text, StandardFont::Helvetica)
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self::new(text, StandardFont::HelveticaBold)
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self::new(text, StandardFont::HelveticaOblique)
    }
}

/// A paragraph of mixed-font runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub style: TextStyle,
}

impl Paragraph {
    pub const fn new(runs: Vec<Run>, style: TextStyle) -> Self {
        Self { runs, style }
    }

    /// A paragraph with a single run.
    pub fn plain(text: impl Into<String>, font: StandardFont, style: TextStyle) -> Self {
        Self::new(vec![Run::new(text, font)], style)
    }

    /// Break the paragraph into lines no wider than `width`.
    pub(crate) fn lines(&self, width: f32) -> Vec<Line> {
        break_lines(&self.runs, self.style.size, width)
    }

    /// Height of the paragraph set in `width`. Empty paragraphs keep one line.
    pub fn height(&self, width: f32) -> f32 {
        lines_height(self.lines(width).len(), self.style.leading)
    }
}

fn lines_height(count: usize, leading: f32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let count = count.max(1) as f32;
    count * leading
}

/// Contiguous characters of a word in one font.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Fragment {
    font: StandardFont,
    text: String,
}

/// Characters between two spaces; may span several runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Word {
    fragments: Vec<Fragment>,
}

impl Word {
    fn push(&mut self, font: StandardFont, c: char) {
        match self.fragments.last_mut() {
            Some(fragment) if fragment.font == font => fragment.text.push(c),
            _ => self.fragments.push(Fragment {
                font,
                text: c.to_string(),
            }),
        }
    }

    fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn width(&self, size: f32) -> f32 {
        self.fragments
            .iter()
            .map(|f| f.font.string_width(&f.text, size))
            .sum()
    }

    /// Cut a word wider than `max_width` into pieces that fit.
    fn split_to_width(self, max_width: f32, size: f32) -> Vec<Self> {
        let mut pieces = Vec::new();
        let mut current = Self::default();
        let mut width = 0.0;

        for fragment in self.fragments {
            for c in fragment.text.chars() {
                let char_width = f32::from(fragment.font.char_width(c)) * size / 1000.0;
                if !current.is_empty() && width + char_width > max_width {
                    pieces.push(std::mem::take(&mut current));
                    width = 0.0;
                }
                current.push(fragment.font, c);
                width += char_width;
            }
        }

        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}

enum Token {
    Word(Word),
    Break,
}

fn tokenize(runs: &[Run]) -> Vec<Token> {
    fn flush(tokens: &mut Vec<Token>, word: &mut Word) {
        if !word.is_empty() {
            tokens.push(Token::Word(std::mem::take(word)));
        }
    }

    let mut tokens = Vec::new();
    let mut word = Word::default();

    for run in runs {
        for c in run.text.chars() {
            match c {
                '\n' => {
                    flush(&mut tokens, &mut word);
                    tokens.push(Token::Break);
                }
                ' ' | '\t' | '\r' => flush(&mut tokens, &mut word),
                _ => word.push(run.font, c),
            }
        }
    }
    flush(&mut tokens, &mut word);

    tokens
}

/// One laid out line of a paragraph.
#[derive(Debug, Clone, Default)]
pub(crate) struct Line {
    words: Vec<Word>,
    /// Natural width including single spaces between words
    width: f32,
    /// Last line of a paragraph (never stretched when justifying)
    last: bool,
}

impl Line {
    /// Plain text of the line.
    #[cfg(test)]
    fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.fragments.iter().map(|f| f.text.as_str()).collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn space_width(size: f32) -> f32 {
    // The space has the same advance in all three faces
    f32::from(StandardFont::Helvetica.char_width(' ')) * size / 1000.0
}

fn break_lines(runs: &[Run], size: f32, max_width: f32) -> Vec<Line> {
    let space = space_width(size);
    let mut lines = Vec::new();
    let mut line = Line::default();

    for token in tokenize(runs) {
        match token {
            Token::Break => {
                line.last = true;
                lines.push(std::mem::take(&mut line));
            }
            Token::Word(word) => {
                let pieces = if word.width(size) > max_width {
                    word.split_to_width(max_width, size)
                } else {
                    vec![word]
                };

                for piece in pieces {
                    let width = piece.width(size);
                    if !line.words.is_empty() && line.width + space + width > max_width + EPSILON {
                        lines.push(std::mem::take(&mut line));
                    }
                    if !line.words.is_empty() {
                        line.width += space;
                    }
                    line.width += width;
                    line.words.push(piece);
                }
            }
        }
    }

    if !line.words.is_empty() {
        line.last = true;
        lines.push(line);
    }

    lines
}

/// Draw `lines` with the first line box starting at `top`.
fn draw_lines(
    canvas: &mut Canvas,
    lines: &[Line],
    style: &TextStyle,
    x: f32,
    top: f32,
    width: f32,
) {
    if lines.is_empty() {
        return;
    }

    canvas.set_fill_color(style.color);

    for (i, line) in lines.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let line_top = top - i as f32 * style.leading;
        let baseline = line_top - (style.leading - style.size) / 2.0 - style.size * 0.8;

        let gaps = line.words.len().saturating_sub(1);
        let (offset, word_spacing) = match style.align {
            Align::Left => (0.0, 0.0),
            Align::Center => (((width - line.width) / 2.0).max(0.0), 0.0),
            Align::Justify if !line.last && gaps > 0 => {
                #[allow(clippy::cast_precision_loss)]
                let per_gap = (width - line.width).max(0.0) / gaps as f32;
                (0.0, per_gap)
            }
            Align::Justify => (0.0, 0.0),
        };

        // Merge fragments into per-font segments; spaces join the preceding font
        let mut segments: Vec<(StandardFont, String)> = Vec::new();
        for (w, word) in line.words.iter().enumerate() {
            if w > 0
                && let Some((_, text)) = segments.last_mut()
            {
                text.push(' ');
            }
            for fragment in &word.fragments {
                match segments.last_mut() {
                    Some((font, text)) if *font == fragment.font => text.push_str(&fragment.text),
                    _ => segments.push((fragment.font, fragment.text.clone())),
                }
            }
        }

        let segments: Vec<TextSegment<'_>> = segments
            .iter()
            .map(|(font, text)| TextSegment { font: *font, text })
            .collect();
        canvas.text_line(x + offset, baseline, style.size, word_spacing, &segments);
    }

    canvas.set_fill_color(Color::BLACK);
}

// =============================================================================
// Choice Indicators
// =============================================================================

/// Where the box sits relative to its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxPosition {
    #[default]
    Before,
    After,
}

/// One labelled box of a choice group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceOption {
    pub label: String,
    pub marked: bool,
}

/// A row of labelled boxes; marked boxes carry an X.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceGroup {
    pub options: Vec<ChoiceOption>,
    pub box_position: BoxPosition,
    pub size: f32,
}

impl ChoiceGroup {
    /// Build a group from labels, marking the options for which `marked` holds.
    pub fn new<'a>(
        labels: impl IntoIterator<Item = &'a str>,
        marked: impl Fn(&str) -> bool,
        box_position: BoxPosition,
        size: f32,
    ) -> Self {
        let options = labels
            .into_iter()
            .map(|label| ChoiceOption {
                label: label.to_string(),
                marked: marked(label),
            })
            .collect();
        Self {
            options,
            box_position,
            size,
        }
    }

    pub fn height(&self) -> f32 {
        self.size * 1.2
    }

    fn draw(&self, canvas: &mut Canvas, x: f32, top: f32) {
        let font = StandardFont::Helvetica;
        let side = self.size * 0.85;
        let baseline = top - self.size;
        let box_y = baseline - self.size * 0.1;

        canvas.set_line_width(0.6);
        let mut cx = x;
        for option in &self.options {
            let label_width = font.string_width(&option.label, self.size);
            let (box_x, label_x) = match self.box_position {
                BoxPosition::Before => (cx, cx + side + CHOICE_BOX_GAP),
                BoxPosition::After => (cx + label_width + CHOICE_BOX_GAP, cx),
            };

            canvas.stroke_rect(box_x, box_y, side, side);
            if option.marked {
                canvas.line(box_x, box_y, box_x + side, box_y + side);
                canvas.line(box_x, box_y + side, box_x + side, box_y);
            }
            canvas.text_line(
                label_x,
                baseline,
                self.size,
                0.0,
                &[TextSegment {
                    font,
                    text: &option.label,
                }],
            );

            cx += label_width + CHOICE_BOX_GAP + side + CHOICE_GAP;
        }
    }
}

// =============================================================================
// Tables
// =============================================================================

/// Cell padding in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Padding {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Padding {
    pub const fn new(left: f32, right: f32, top: f32, bottom: f32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }
}

/// What a cell holds.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    Empty,
    Text(Paragraph),
    Choices(ChoiceGroup),
    /// Position occupied by a cell spanning from a row above
    Covered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub content: CellContent,
    /// Number of rows the cell occupies (at least 1)
    pub row_span: usize,
    /// Width of a rule drawn along the top edge of the cell
    pub rule_above: Option<f32>,
}

impl Cell {
    fn with(content: CellContent) -> Self {
        Self {
            content,
            row_span: 1,
            rule_above: None,
        }
    }

    pub fn empty() -> Self {
        Self::with(CellContent::Empty)
    }

    pub fn covered() -> Self {
        Self::with(CellContent::Covered)
    }

    pub fn text(paragraph: Paragraph) -> Self {
        Self::with(CellContent::Text(paragraph))
    }

    pub fn choices(group: ChoiceGroup) -> Self {
        Self::with(CellContent::Choices(group))
    }

    #[must_use]
    pub fn spanning(mut self, rows: usize) -> Self {
        self.row_span = rows.max(1);
        self
    }

    #[must_use]
    pub const fn rule_above(mut self, width: f32) -> Self {
        self.rule_above = Some(width);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub min_height: f32,
}

impl Row {
    pub const fn new(cells: Vec<Cell>) -> Self {
        Self {
            cells,
            min_height: 0.0,
        }
    }

    #[must_use]
    pub const fn min_height(mut self, height: f32) -> Self {
        self.min_height = height;
        self
    }
}

/// Appearance shared by every cell of a table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TableStyle {
    /// Width of the cell borders; no borders when unset
    pub grid: Option<f32>,
    pub background: Option<Color>,
    pub padding: Padding,
    pub valign: VAlign,
}

/// Rows of cells over fixed column widths.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<f32>,
    pub rows: Vec<Row>,
    pub style: TableStyle,
}

impl Table {
    pub const fn new(columns: Vec<f32>, rows: Vec<Row>, style: TableStyle) -> Self {
        Self {
            columns,
            rows,
            style,
        }
    }

    pub fn width(&self) -> f32 {
        self.columns.iter().sum()
    }
}

/// Cell content measured for its column.
enum Prepared<'a> {
    Empty,
    Covered,
    Text { paragraph: &'a Paragraph, lines: Vec<Line> },
    Choices(&'a ChoiceGroup),
}

impl Prepared<'_> {
    fn height(&self) -> f32 {
        match self {
            Self::Empty | Self::Covered => 0.0,
            Self::Text { paragraph, lines } => lines_height(lines.len(), paragraph.style.leading),
            Self::Choices(group) => group.height(),
        }
    }
}

/// A table with row heights resolved.
struct TableLayout<'a> {
    table: &'a Table,
    column_x: Vec<f32>,
    cells: Vec<Vec<Prepared<'a>>>,
    heights: Vec<f32>,
}

impl<'a> TableLayout<'a> {
    fn new(table: &'a Table) -> Result<Self> {
        let columns = table.columns.len();
        if columns == 0 || table.columns.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(Error::InvalidGeometry(format!(
                "table column widths {:?}",
                table.columns
            )));
        }

        let padding = table.style.padding;
        let mut column_x = Vec::with_capacity(columns);
        let mut x = 0.0;
        for width in &table.columns {
            column_x.push(x);
            x += width;
        }

        let mut cells = Vec::with_capacity(table.rows.len());
        for (r, row) in table.rows.iter().enumerate() {
            if row.cells.len() != columns {
                return Err(Error::InvalidGeometry(format!(
                    "row {r} has {} cells for {columns} columns",
                    row.cells.len()
                )));
            }
            let overrun = row
                .cells
                .iter()
                .position(|cell| r + cell.row_span > table.rows.len());
            if let Some(c) = overrun {
                return Err(Error::InvalidGeometry(format!(
                    "cell {c} of row {r} spans {} rows, past the end of the table",
                    row.cells[c].row_span
                )));
            }
            let prepared: Vec<Prepared<'a>> = row
                .cells
                .iter()
                .zip(&table.columns)
                .map(|(cell, width)| match &cell.content {
                    CellContent::Empty => Prepared::Empty,
                    CellContent::Covered => Prepared::Covered,
                    CellContent::Choices(group) => Prepared::Choices(group),
                    CellContent::Text(paragraph) => Prepared::Text {
                        paragraph,
                        lines: paragraph.lines((width - padding.left - padding.right).max(1.0)),
                    },
                })
                .collect();
            cells.push(prepared);
        }

        let heights = resolve_heights(table, &cells);
        Ok(Self {
            table,
            column_x,
            cells,
            heights,
        })
    }

    /// End (exclusive) of the band of rows starting at `start` that row spans
    /// tie together.
    fn band_end(&self, start: usize) -> usize {
        let mut end = start + 1;
        let mut r = start;
        while r < end {
            for cell in &self.table.rows[r].cells {
                end = end.max(r + cell.row_span);
            }
            r += 1;
        }
        end.min(self.table.rows.len())
    }

    fn height(&self, rows: std::ops::Range<usize>) -> f32 {
        self.heights[rows].iter().sum()
    }

    /// Drop trailing lines from the tallest text cells of `rows` until the
    /// band fits in `available`. Returns false when no text is left to drop.
    fn clip_band(&mut self, rows: std::ops::Range<usize>, available: f32) -> bool {
        while self.height(rows.clone()) > available + EPSILON {
            let tallest = rows
                .clone()
                .flat_map(|r| (0..self.cells[r].len()).map(move |c| (r, c)))
                .filter_map(|(r, c)| match &self.cells[r][c] {
                    Prepared::Text { paragraph, lines } if lines.len() > 1 => {
                        Some(((r, c), lines_height(lines.len(), paragraph.style.leading)))
                    }
                    _ => None,
                })
                .max_by(|a, b| a.1.total_cmp(&b.1));
            let Some(((r, c), _)) = tallest else {
                return false;
            };
            if let Prepared::Text { lines, .. } = &mut self.cells[r][c] {
                lines.pop();
            }
            self.heights = resolve_heights(self.table, &self.cells);
        }
        true
    }

    /// Draw rows `rows` with the top edge of the first row at `top`.
    fn draw_rows(&self, canvas: &mut Canvas, x0: f32, top: f32, rows: std::ops::Range<usize>) {
        let style = &self.table.style;
        let mut rects = Vec::new();

        let mut row_top = top;
        for r in rows.clone() {
            for (c, cell) in self.table.rows[r].cells.iter().enumerate() {
                if matches!(self.cells[r][c], Prepared::Covered) {
                    continue;
                }
                let span_end = (r + cell.row_span).min(rows.end);
                let height = self.height(r..span_end);
                let rect = Rect {
                    x: x0 + self.column_x[c],
                    y: row_top - height,
                    width: self.table.columns[c],
                    height,
                };
                rects.push((rect, cell));

                if let Some(background) = style.background {
                    canvas.set_fill_color(background);
                    canvas.fill_rect(rect.x, rect.y, rect.width, rect.height);
                    canvas.set_fill_color(Color::BLACK);
                }
                match &self.cells[r][c] {
                    Prepared::Text { paragraph, lines } => {
                        draw_text_cell(canvas, rect, style, paragraph, lines);
                    }
                    Prepared::Choices(group) => {
                        let inner = rect.height - style.padding.top - style.padding.bottom;
                        let offset = valign_offset(style.valign, inner, group.height());
                        group.draw(
                            canvas,
                            rect.x + style.padding.left,
                            rect.top() - style.padding.top - offset,
                        );
                    }
                    Prepared::Empty | Prepared::Covered => {}
                }
            }
            row_top -= self.heights[r];
        }

        draw_borders(canvas, style, &rects);
    }
}

/// Row heights: the tallest single-row cell of each row, then spanning cells
/// grow the last row they cover when the spanned rows are too short.
fn resolve_heights(table: &Table, cells: &[Vec<Prepared<'_>>]) -> Vec<f32> {
    let pad = table.style.padding.top + table.style.padding.bottom;
    let mut heights: Vec<f32> = table
        .rows
        .iter()
        .zip(cells)
        .map(|(row, prepared)| {
            row.cells
                .iter()
                .zip(prepared)
                .filter(|(cell, p)| cell.row_span == 1 && !matches!(p, Prepared::Covered))
                .map(|(_, p)| p.height() + pad)
                .fold(row.min_height, f32::max)
        })
        .collect();

    for (r, row) in table.rows.iter().enumerate() {
        for (c, cell) in row.cells.iter().enumerate() {
            if cell.row_span > 1 && !matches!(cells[r][c], Prepared::Covered) {
                let last = (r + cell.row_span).min(heights.len()) - 1;
                let have: f32 = heights[r..=last].iter().sum();
                let need = cells[r][c].height() + pad;
                if need > have {
                    heights[last] += need - have;
                }
            }
        }
    }
    heights
}

/// Whole lines of `leading` that fit in `space`.
fn lines_that_fit(space: f32, leading: f32) -> usize {
    let count = ((space + EPSILON) / leading).floor().max(0.0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let count = count as usize;
    count
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
}

impl Rect {
    fn top(&self) -> f32 {
        self.y + self.height
    }
}

fn valign_offset(valign: VAlign, available: f32, content: f32) -> f32 {
    match valign {
        VAlign::Top => 0.0,
        VAlign::Middle => ((available - content) / 2.0).max(0.0),
    }
}

fn draw_text_cell(
    canvas: &mut Canvas,
    rect: Rect,
    style: &TableStyle,
    paragraph: &Paragraph,
    lines: &[Line],
) {
    let padding = style.padding;
    let inner_width = rect.width - padding.left - padding.right;
    let inner_height = rect.height - padding.top - padding.bottom;
    let offset = valign_offset(
        style.valign,
        inner_height,
        lines_height(lines.len(), paragraph.style.leading),
    );
    draw_lines(
        canvas,
        lines,
        &paragraph.style,
        rect.x + padding.left,
        rect.top() - padding.top - offset,
        inner_width,
    );
}

fn draw_borders(canvas: &mut Canvas, style: &TableStyle, rects: &[(Rect, &Cell)]) {
    canvas.set_stroke_color(Color::BLACK);
    if let Some(width) = style.grid {
        canvas.set_line_width(width);
        for (rect, _) in rects {
            canvas.stroke_rect(rect.x, rect.y, rect.width, rect.height);
        }
    }
    for (rect, cell) in rects {
        if let Some(width) = cell.rule_above {
            canvas.set_line_width(width);
            canvas.line(rect.x, rect.top(), rect.x + rect.width, rect.top());
        }
    }
}

// =============================================================================
// Blocks
// =============================================================================

/// An image XObject registered in the page resources under `name`, drawn
/// centered in the frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    pub name: String,
    pub width: f32,
    pub height: f32,
}

/// One element of the document flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Table(Table),
    Paragraph(Paragraph),
    Image(ImageBlock),
    /// Vertical space; dropped at the top of a page
    Spacer(f32),
    /// Finish the current page (no-op on an empty page)
    PageBreak,
}

// =============================================================================
// Page Flow
// =============================================================================

/// Page number and geometry handed to decorators.
#[derive(Debug, Clone, Copy)]
pub struct PageInfo {
    /// 1-based page number
    pub number: usize,
    pub geometry: PageGeometry,
}

/// Draws marks on every page as it leaves the flow.
pub trait PageDecorator {
    fn decorate(&self, canvas: &mut Canvas, page: &PageInfo);
}

/// A page that went through the emission boundary.
#[derive(Debug, Clone)]
pub struct FinishedPage {
    pub number: usize,
    pub canvas: Canvas,
}

/// Pours blocks into pages.
pub struct Flow<'a> {
    geometry: PageGeometry,
    decorators: Vec<Box<dyn PageDecorator + 'a>>,
    pages: Vec<FinishedPage>,
    canvas: Canvas,
    cursor: f32,
}

impl<'a> Flow<'a> {
    pub fn new(
        geometry: PageGeometry,
        decorators: Vec<Box<dyn PageDecorator + 'a>>,
    ) -> Result<Self> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            decorators,
            pages: Vec::new(),
            canvas: Canvas::new(),
            cursor: geometry.frame_top(),
        })
    }

    /// Space left on the current page.
    fn remaining(&self) -> f32 {
        self.cursor - self.geometry.frame_bottom()
    }

    fn page_is_empty(&self) -> bool {
        self.cursor >= self.geometry.frame_top() - EPSILON
    }

    fn fits(&self, height: f32) -> bool {
        height <= self.remaining() + EPSILON
    }

    /// Page emission boundary.
    fn emit_page(&mut self) {
        let mut canvas = std::mem::take(&mut self.canvas);
        let info = PageInfo {
            number: self.pages.len() + 1,
            geometry: self.geometry,
        };
        for decorator in &self.decorators {
            decorator.decorate(&mut canvas, &info);
        }
        debug!(page = info.number, "Emitted page");
        self.pages.push(FinishedPage {
            number: info.number,
            canvas,
        });
        self.cursor = self.geometry.frame_top();
    }

    pub fn push(&mut self, block: &Block) -> Result<()> {
        match block {
            Block::Spacer(height) => {
                if !self.page_is_empty() {
                    self.cursor -= height.min(self.remaining());
                }
                Ok(())
            }
            Block::PageBreak => {
                if !self.page_is_empty() {
                    self.emit_page();
                }
                Ok(())
            }
            Block::Image(image) => self.place_image(image),
            Block::Paragraph(paragraph) => self.place_paragraph(paragraph),
            Block::Table(table) => self.place_table(table),
        }
    }

    /// Finish the last page and return all pages. A document always has at
    /// least one page.
    pub fn finish(mut self) -> Vec<FinishedPage> {
        if !self.page_is_empty() || self.pages.is_empty() {
            self.emit_page();
        }
        self.pages
    }

    fn overflow(&self, what: &str, needed: f32) -> Error {
        Error::LayoutOverflow {
            what: what.to_string(),
            needed,
            available: self.geometry.frame_height(),
        }
    }

    fn place_image(&mut self, image: &ImageBlock) -> Result<()> {
        if image.height > self.geometry.frame_height() + EPSILON
            || image.width > self.geometry.frame_width() + EPSILON
        {
            return Err(self.overflow(&format!("image {}", image.name), image.height));
        }
        if !self.fits(image.height) {
            self.emit_page();
        }

        let x = self.geometry.margin_left + (self.geometry.frame_width() - image.width) / 2.0;
        let y = self.cursor - image.height;
        self.canvas.draw_image(&image.name, x, y, image.width, image.height);
        self.cursor = y;
        Ok(())
    }

    fn place_paragraph(&mut self, paragraph: &Paragraph) -> Result<()> {
        let width = self.geometry.frame_width();
        let leading = paragraph.style.leading;
        if leading > self.geometry.frame_height() {
            return Err(self.overflow("paragraph line", leading));
        }

        let lines = paragraph.lines(width);
        let mut rest: &[Line] = &lines;
        loop {
            let height = lines_height(rest.len(), leading);
            if self.fits(height) {
                draw_lines(
                    &mut self.canvas,
                    rest,
                    &paragraph.style,
                    self.geometry.margin_left,
                    self.cursor,
                    width,
                );
                self.cursor -= height;
                return Ok(());
            }
            if !self.page_is_empty() && self.fits_lines(leading) == 0 {
                self.emit_page();
                continue;
            }

            // Fill the rest of this page line by line
            let take = self.fits_lines(leading).min(rest.len());
            draw_lines(
                &mut self.canvas,
                &rest[..take],
                &paragraph.style,
                self.geometry.margin_left,
                self.cursor,
                width,
            );
            rest = &rest[take..];
            self.emit_page();
        }
    }

    fn fits_lines(&self, leading: f32) -> usize {
        lines_that_fit(self.remaining(), leading)
    }

    fn place_table(&mut self, table: &Table) -> Result<()> {
        let mut layout = TableLayout::new(table)?;
        let x0 = self.geometry.margin_left;
        let mut start = 0;

        while start < table.rows.len() {
            let end = layout.band_end(start);
            let height = layout.height(start..end);

            if self.fits(height) {
                layout.draw_rows(&mut self.canvas, x0, self.cursor, start..end);
                self.cursor -= height;
                start = end;
                continue;
            }
            if !self.page_is_empty() {
                self.emit_page();
                continue;
            }
            if end == start + 1 {
                self.place_split_row(&layout, start)?;
                start = end;
                continue;
            }
            if layout.clip_band(start..end, self.remaining()) {
                warn!(
                    first_row = start,
                    last_row = end - 1,
                    "Spanned table rows taller than a page, text clipped to fit"
                );
                continue;
            }
            return Err(self.overflow(&format!("table row {start}"), height));
        }

        Ok(())
    }

    /// Spread one table row over as many pages as its tallest cell needs.
    ///
    /// Each text cell continues on the next page where it stopped; other
    /// content is drawn on the first page only.
    fn place_split_row(&mut self, layout: &TableLayout<'_>, row: usize) -> Result<()> {
        let table = layout.table;
        let style = &table.style;
        let split_style = TableStyle {
            valign: VAlign::Top,
            ..*style
        };
        let pad = style.padding.top + style.padding.bottom;
        let cells = &layout.cells[row];
        let mut consumed = vec![0; cells.len()];
        let mut first = true;

        loop {
            let space = self.remaining() - pad;
            let chunks: Vec<usize> = cells
                .iter()
                .zip(&consumed)
                .map(|(cell, done)| match cell {
                    Prepared::Text { paragraph, lines } => {
                        lines_that_fit(space, paragraph.style.leading).min(lines.len() - done)
                    }
                    _ => 0,
                })
                .collect();
            let finished = cells.iter().zip(&consumed).zip(&chunks).all(|((cell, done), take)| {
                !matches!(cell, Prepared::Text { lines, .. } if done + take < lines.len())
            });

            if !finished && chunks.iter().all(|take| *take == 0) {
                if self.page_is_empty() {
                    let leading = cells
                        .iter()
                        .map(|cell| match cell {
                            Prepared::Text { paragraph, .. } => paragraph.style.leading,
                            _ => 0.0,
                        })
                        .fold(0.0, f32::max);
                    return Err(self.overflow(&format!("table row {row} line"), leading + pad));
                }
                self.emit_page();
                continue;
            }

            let content = cells
                .iter()
                .zip(&chunks)
                .map(|(cell, take)| match cell {
                    Prepared::Text { paragraph, .. } if *take > 0 => {
                        lines_height(*take, paragraph.style.leading)
                    }
                    Prepared::Choices(group) if first => group.height(),
                    _ => 0.0,
                })
                .fold(0.0, f32::max);
            let height = if finished {
                let natural = content + pad;
                let natural = if first {
                    natural.max(table.rows[row].min_height)
                } else {
                    natural
                };
                natural.min(self.remaining())
            } else {
                self.remaining()
            };

            let mut rects = Vec::with_capacity(cells.len());
            for (c, (cell, prepared)) in table.rows[row].cells.iter().zip(cells).enumerate() {
                let rect = Rect {
                    x: self.geometry.margin_left + layout.column_x[c],
                    y: self.cursor - height,
                    width: table.columns[c],
                    height,
                };
                rects.push((rect, cell));

                if let Some(background) = style.background {
                    self.canvas.set_fill_color(background);
                    self.canvas.fill_rect(rect.x, rect.y, rect.width, rect.height);
                    self.canvas.set_fill_color(Color::BLACK);
                }
                match prepared {
                    Prepared::Text { paragraph, lines } => {
                        let done = consumed[c];
                        let chunk = &lines[done..done + chunks[c]];
                        draw_text_cell(&mut self.canvas, rect, &split_style, paragraph, chunk);
                    }
                    Prepared::Choices(group) if first => group.draw(
                        &mut self.canvas,
                        rect.x + style.padding.left,
                        rect.top() - style.padding.top,
                    ),
                    _ => {}
                }
            }
            draw_borders(&mut self.canvas, style, &rects);

            self.cursor -= height;
            for (done, take) in consumed.iter_mut().zip(&chunks) {
                *done += take;
            }
            if finished {
                return Ok(());
            }
            first = false;
            self.emit_page();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn style() -> TextStyle {
        TextStyle::new(8.0, 10.0)
    }

    struct CountingDecorator<'a> {
        seen: &'a RefCell<Vec<usize>>,
    }

    impl PageDecorator for CountingDecorator<'_> {
        fn decorate(&self, canvas: &mut Canvas, page: &PageInfo) {
            self.seen.borrow_mut().push(page.number);
            canvas.fill_rect(0.0, 0.0, 1.0, 1.0);
        }
    }

    fn text_table(rows: usize, min_height: f32) -> Table {
        let rows = (0..rows)
            .map(|i| {
                Row::new(vec![Cell::text(Paragraph::plain(
                    format!("row {i}"),
                    StandardFont::Helvetica,
                    style(),
                ))])
                .min_height(min_height)
            })
            .collect();
        Table::new(
            vec![540.0],
            rows,
            TableStyle {
                grid: Some(1.0),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_break_lines_wraps_words() {
        let runs = vec![Run::regular("aaa bbb ccc")];
        // "aaa bbb" is 3*4.448 + 2.224 + 3*4.448 = 28.9pt at 8pt
        let lines = break_lines(&runs, 8.0, 30.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "aaa bbb");
        assert_eq!(lines[1].text(), "ccc");
        assert!(!lines[0].last);
        assert!(lines[1].last);
    }

    #[test]
    fn test_break_lines_explicit_breaks() {
        let runs = vec![
            Run::bold("1."),
            Run::regular(" uno\n\n"),
            Run::bold("2."),
            Run::regular(" dos"),
        ];
        let lines = break_lines(&runs, 8.0, 500.0);
        let texts: Vec<_> = lines.iter().map(Line::text).collect();
        assert_eq!(texts, vec!["1. uno", "", "2. dos"]);
        assert!(lines[0].last);
    }

    #[test]
    fn test_break_lines_splits_long_word() {
        let runs = vec![Run::regular("x".repeat(200))];
        let lines = break_lines(&runs, 8.0, 100.0);
        assert!(lines.len() > 1);
        let rejoined: String = lines.iter().map(Line::text).collect();
        assert_eq!(rejoined.len(), 200);
        for line in &lines {
            assert!(line.width <= 100.0 + EPSILON);
        }
    }

    #[test]
    fn test_word_keeps_fonts_across_runs() {
        let runs = vec![Run::bold("Ciudad:"), Run::regular("Bogotá")];
        let lines = break_lines(&runs, 8.0, 500.0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].words.len(), 1);
        assert_eq!(lines[0].words[0].fragments.len(), 2);
    }

    #[test]
    fn test_empty_paragraph_keeps_one_line() {
        let p = Paragraph::plain("", StandardFont::Helvetica, style());
        assert!((p.height(100.0) - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_row_span_band() {
        let para = |t: &str| Cell::text(Paragraph::plain(t, StandardFont::Helvetica, style()));
        let table = Table::new(
            vec![300.0, 240.0],
            vec![
                Row::new(vec![para("Ciudad").spanning(2), para("Día")]),
                Row::new(vec![Cell::covered(), para("5")]),
                Row::new(vec![para("x"), para("y")]),
            ],
            TableStyle::default(),
        );
        let layout = TableLayout::new(&table).unwrap();
        assert_eq!(layout.band_end(0), 2);
        assert_eq!(layout.band_end(2), 3);
    }

    #[test]
    fn test_row_cell_count_mismatch() {
        let table = Table::new(
            vec![270.0, 270.0],
            vec![Row::new(vec![Cell::empty()])],
            TableStyle::default(),
        );
        assert!(matches!(
            TableLayout::new(&table),
            Err(Error::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_min_height_respected() {
        let table = text_table(1, 108.0);
        let layout = TableLayout::new(&table).unwrap();
        assert!((layout.height(0..1) - 108.0).abs() < EPSILON);
    }

    #[test]
    fn test_flow_decorates_every_page() {
        let seen = RefCell::new(Vec::new());
        let mut flow = Flow::new(
            PageGeometry::LEGAL,
            vec![Box::new(CountingDecorator { seen: &seen })],
        )
        .unwrap();

        // 100pt rows: nine fit in the 928.8pt frame
        flow.push(&Block::Table(text_table(20, 100.0))).unwrap();
        flow.push(&Block::PageBreak).unwrap();
        flow.push(&Block::Paragraph(Paragraph::plain("end", StandardFont::Helvetica, style())))
            .unwrap();
        let pages = flow.finish();

        assert_eq!(pages.len(), 4);
        assert_eq!(*seen.borrow(), vec![1, 2, 3, 4]);
        assert!(pages.iter().all(|p| p.canvas.as_str().contains("0.00 0.00 1.00 1.00 re f")));
    }

    #[test]
    fn test_empty_flow_has_one_page() {
        let flow = Flow::new(PageGeometry::LEGAL, Vec::new()).unwrap();
        assert_eq!(flow.finish().len(), 1);
    }

    #[test]
    fn test_page_break_on_empty_page_is_noop() {
        let mut flow = Flow::new(PageGeometry::LEGAL, Vec::new()).unwrap();
        flow.push(&Block::PageBreak).unwrap();
        flow.push(&Block::Spacer(20.0)).unwrap();
        assert_eq!(flow.finish().len(), 1);
    }

    #[test]
    fn test_tall_paragraph_row_splits_between_lines() {
        let text = "palabra ".repeat(4000);
        let table = Table::new(
            vec![540.0],
            vec![Row::new(vec![Cell::text(Paragraph::plain(
                text,
                StandardFont::Helvetica,
                style().align(Align::Justify),
            ))])],
            TableStyle {
                grid: Some(1.0),
                valign: VAlign::Top,
                padding: Padding::new(4.0, 4.0, 2.0, 4.0),
                ..Default::default()
            },
        );

        let mut flow = Flow::new(PageGeometry::LEGAL, Vec::new()).unwrap();
        flow.push(&Block::Table(table)).unwrap();
        assert!(flow.finish().len() > 1);
    }

    fn tj_count(pages: &[FinishedPage]) -> usize {
        pages.iter().map(|p| p.canvas.as_str().matches(" Tj").count()).sum()
    }

    #[test]
    fn test_tall_two_cell_row_splits_by_lines() {
        let plain = |t: String| Paragraph::plain(t.trim_end(), StandardFont::Helvetica, style());
        let left = plain("uno ".repeat(3000));
        let right = plain("dos ".repeat(1500));
        let expected = left.lines(270.0).len() + right.lines(270.0).len();
        let table = Table::new(
            vec![270.0, 270.0],
            vec![Row::new(vec![Cell::text(left), Cell::text(right)])],
            TableStyle {
                grid: Some(1.0),
                ..Default::default()
            },
        );

        let mut flow = Flow::new(PageGeometry::LEGAL, Vec::new()).unwrap();
        flow.push(&Block::Table(table)).unwrap();
        let pages = flow.finish();

        assert!(pages.len() > 2);
        // Every line lands on some page exactly once
        assert_eq!(tj_count(&pages), expected);
    }

    #[test]
    fn test_spanned_band_clipped_to_page() {
        let para = |t: &str| Cell::text(Paragraph::plain(t, StandardFont::Helvetica, style()));
        let long = "palabra ".repeat(4000);
        let full = Paragraph::plain(long.as_str(), StandardFont::Helvetica, style())
            .lines(270.0)
            .len();
        let table = Table::new(
            vec![270.0, 270.0],
            vec![
                Row::new(vec![para(&long).spanning(2), para("a")]),
                Row::new(vec![Cell::covered(), para("b")]),
            ],
            TableStyle::default(),
        );

        let mut flow = Flow::new(PageGeometry::LEGAL, Vec::new()).unwrap();
        flow.push(&Block::Table(table)).unwrap();
        let pages = flow.finish();

        assert_eq!(pages.len(), 1);
        let drawn = tj_count(&pages);
        assert!(drawn > 2 && drawn < full + 2);
    }

    #[test]
    fn test_min_height_taller_than_page_is_clamped() {
        let mut flow = Flow::new(PageGeometry::LEGAL, Vec::new()).unwrap();
        flow.push(&Block::Table(text_table(1, 2000.0))).unwrap();
        let pages = flow.finish();
        assert_eq!(pages.len(), 1);
        assert_eq!(tj_count(&pages), 1);
    }

    #[test]
    fn test_line_taller_than_page_is_error() {
        let tall = || {
            Cell::text(Paragraph::plain(
                "a",
                StandardFont::Helvetica,
                TextStyle::new(8.0, 2000.0),
            ))
        };
        let table = Table::new(
            vec![270.0, 270.0],
            vec![Row::new(vec![tall(), tall()])],
            TableStyle::default(),
        );

        let mut flow = Flow::new(PageGeometry::LEGAL, Vec::new()).unwrap();
        assert!(matches!(
            flow.push(&Block::Table(table)),
            Err(Error::LayoutOverflow { .. })
        ));
    }

    #[test]
    fn test_row_span_past_end_rejected() {
        let para = |t: &str| Cell::text(Paragraph::plain(t, StandardFont::Helvetica, style()));
        let table = Table::new(
            vec![270.0, 270.0],
            vec![
                Row::new(vec![para("a"), para("b")]),
                Row::new(vec![para("Ciudad").spanning(3), para("c")]),
            ],
            TableStyle::default(),
        );
        assert!(matches!(
            TableLayout::new(&table),
            Err(Error::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_image_too_tall_is_error() {
        let mut flow = Flow::new(PageGeometry::LEGAL, Vec::new()).unwrap();
        let image = ImageBlock {
            name: "Im1".to_string(),
            width: 72.0,
            height: 5000.0,
        };
        assert!(flow.push(&Block::Image(image)).is_err());
    }

    #[test]
    fn test_choice_group_marks_only_match() {
        let labels = ["T.I.", "C.C.", "NUIP"];
        let group = ChoiceGroup::new(labels, |l| l == "C.C.", BoxPosition::Before, 8.0);
        let marked: Vec<_> = group.options.iter().filter(|o| o.marked).collect();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].label, "C.C.");

        let mut canvas = Canvas::new();
        group.draw(&mut canvas, 36.0, 900.0);
        // Three boxes, one X of two lines
        assert_eq!(canvas.as_str().matches(" re S").count(), 3);
        assert_eq!(canvas.as_str().matches(" l S").count(), 2);
    }

    #[test]
    fn test_justified_line_uses_word_spacing() {
        let p = Paragraph::plain(
            "uno dos tres cuatro cinco",
            StandardFont::Helvetica,
            style().align(Align::Justify),
        );
        let lines = p.lines(60.0);
        assert!(lines.len() > 1);

        let mut canvas = Canvas::new();
        draw_lines(&mut canvas, &lines, &p.style, 0.0, 100.0, 60.0);
        let ops = canvas.as_str();
        // First line is stretched, last line is not
        assert!(ops.lines().any(|l| l.ends_with(" Tw") && l != "0.000 Tw"));
        assert!(ops.contains("0.000 Tw"));
    }
}
