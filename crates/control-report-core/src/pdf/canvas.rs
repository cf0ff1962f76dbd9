//! Content stream builder.
//!
//! A [`Canvas`] accumulates PDF drawing operators for one page. Coordinates
//! use the PDF convention: bottom-left origin, Y increasing upward.

use std::fmt::Write;

use super::fonts::{StandardFont, text_to_hex};

/// RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Self = Self::gray(0.0);
    pub const WHITE: Self = Self::gray(1.0);
    /// Section header background
    pub const LIGHT_GREY: Self = Self::gray(0.827);
    /// Footer text
    pub const DARK_GREY: Self = Self::gray(0.663);

    pub const fn gray(level: f32) -> Self {
        Self {
            r: level,
            g: level,
            b: level,
        }
    }
}

/// A run of text drawn in one font.
#[derive(Debug, Clone, Copy)]
pub struct TextSegment<'a> {
    pub font: StandardFont,
    pub text: &'a str,
}

/// Drawing operators for one page.
#[derive(Debug, Clone, Default)]
pub struct Canvas {
    ops: String,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operators as content stream bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.ops.into_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.ops
    }

    pub fn save_state(&mut self) {
        self.ops.push_str("q\n");
    }

    pub fn restore_state(&mut self) {
        self.ops.push_str("Q\n");
    }

    pub fn set_fill_color(&mut self, color: Color) {
        let _ = writeln!(self.ops, "{:.3} {:.3} {:.3} rg", color.r, color.g, color.b);
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        let _ = writeln!(self.ops, "{:.3} {:.3} {:.3} RG", color.r, color.g, color.b);
    }

    pub fn set_line_width(&mut self, width: f32) {
        let _ = writeln!(self.ops, "{width:.2} w");
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let _ = writeln!(self.ops, "{x:.2} {y:.2} {width:.2} {height:.2} re f");
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let _ = writeln!(self.ops, "{x:.2} {y:.2} {width:.2} {height:.2} re S");
    }

    /// Fill then stroke a rectangle with the current colors.
    pub fn fill_stroke_rect(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let _ = writeln!(self.ops, "{x:.2} {y:.2} {width:.2} {height:.2} re B");
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) {
        let _ = writeln!(self.ops, "{x1:.2} {y1:.2} m {x2:.2} {y2:.2} l S");
    }

    /// Draw one line of text starting at the baseline point `(x, y)`.
    ///
    /// `word_spacing` is added to every space character (`Tw`) and is how
    /// justified lines are stretched to the full width.
    pub fn text_line(
        &mut self,
        x: f32,
        y: f32,
        size: f32,
        word_spacing: f32,
        segments: &[TextSegment<'_>],
    ) {
        if segments.iter().all(|s| s.text.is_empty()) {
            return;
        }

        self.ops.push_str("BT\n");
        let _ = writeln!(self.ops, "{word_spacing:.3} Tw");
        let _ = writeln!(self.ops, "{x:.2} {y:.2} Td");

        let mut current_font = None;
        for segment in segments.iter().filter(|s| !s.text.is_empty()) {
            if current_font != Some(segment.font) {
                let _ = writeln!(self.ops, "/{} {size} Tf", segment.font.resource_name());
                current_font = Some(segment.font);
            }
            let _ = writeln!(self.ops, "<{}> Tj", text_to_hex(segment.text));
        }

        self.ops.push_str("ET\n");
    }

    /// Paint an image XObject scaled into the given box.
    pub fn draw_image(&mut self, name: &str, x: f32, y: f32, width: f32, height: f32) {
        self.save_state();
        let _ = writeln!(self.ops, "{width:.2} 0 0 {height:.2} {x:.2} {y:.2} cm");
        let _ = writeln!(self.ops, "/{name} Do");
        self.restore_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_operators() {
        let mut canvas = Canvas::new();
        canvas.set_fill_color(Color::WHITE);
        canvas.fill_stroke_rect(10.0, 20.0, 30.0, 16.0);

        assert_eq!(
            canvas.as_str(),
            "1.000 1.000 1.000 rg\n10.00 20.00 30.00 16.00 re B\n"
        );
    }

    #[test]
    fn test_text_line_switches_fonts() {
        let mut canvas = Canvas::new();
        canvas.text_line(
            36.0,
            900.0,
            8.0,
            0.0,
            &[
                TextSegment {
                    font: StandardFont::HelveticaBold,
                    text: "1. ",
                },
                TextSegment {
                    font: StandardFont::Helvetica,
                    text: "Que",
                },
            ],
        );

        let ops = canvas.as_str();
        assert!(ops.starts_with("BT\n"));
        assert!(ops.contains("/F2 8 Tf\n<312E20> Tj\n/F1 8 Tf\n<517565> Tj\n"));
        assert!(ops.ends_with("ET\n"));
    }

    #[test]
    fn test_empty_text_draws_nothing() {
        let mut canvas = Canvas::new();
        canvas.text_line(0.0, 0.0, 8.0, 0.0, &[]);
        assert!(canvas.is_empty());
    }

    #[test]
    fn test_draw_image_is_isolated() {
        let mut canvas = Canvas::new();
        canvas.draw_image("Im1", 270.0, 900.0, 72.0, 72.0);
        assert!(canvas.as_str().starts_with("q\n"));
        assert!(canvas.as_str().contains("/Im1 Do"));
        assert!(canvas.as_str().ends_with("Q\n"));
    }
}
