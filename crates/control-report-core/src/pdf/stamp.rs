//! Per-page identifier stamp.

use super::canvas::{Canvas, Color, TextSegment};
use super::fonts::StandardFont;
use super::geometry::INCH;
use super::layout::{PageDecorator, PageInfo};

const STAMP_FONT: StandardFont = StandardFont::HelveticaBold;
const STAMP_SIZE: f32 = 10.0;

/// Distance from the right page edge to the right end of the label
const RIGHT_OFFSET: f32 = 0.5 * INCH + 8.0;

/// Distance from the top page edge to the bottom of the label box
const TOP_OFFSET: f32 = 0.3 * INCH + 6.0;

const BOX_HEIGHT: f32 = 16.0;
const BOX_PADDING: f32 = 4.0;

/// Draws `PDF #<id>` in a white, black-bordered box near the top-right
/// corner of every page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierStamp {
    label: String,
}

impl IdentifierStamp {
    pub fn new(case_id: u32) -> Self {
        Self {
            label: Self::label_for(case_id),
        }
    }

    /// Stamp text for a case identifier.
    pub fn label_for(case_id: u32) -> String {
        format!("PDF #{case_id}")
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl PageDecorator for IdentifierStamp {
    fn decorate(&self, canvas: &mut Canvas, page: &PageInfo) {
        let text_width = STAMP_FONT.string_width(&self.label, STAMP_SIZE);
        let x = page.geometry.width - RIGHT_OFFSET - text_width;
        let y = page.geometry.height - TOP_OFFSET;

        canvas.save_state();
        canvas.set_line_width(1.0);
        canvas.set_fill_color(Color::WHITE);
        canvas.set_stroke_color(Color::BLACK);
        canvas.fill_stroke_rect(
            x - BOX_PADDING,
            y - 2.0,
            text_width + 2.0 * BOX_PADDING,
            BOX_HEIGHT,
        );
        canvas.set_fill_color(Color::BLACK);
        canvas.text_line(
            x,
            y + 2.0,
            STAMP_SIZE,
            0.0,
            &[TextSegment {
                font: STAMP_FONT,
                text: &self.label,
            }],
        );
        canvas.restore_state();
    }
}
