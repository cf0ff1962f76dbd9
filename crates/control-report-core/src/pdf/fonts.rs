//! Standard Type1 fonts used by the report.
//!
//! The report only needs the Helvetica family, which every PDF reader ships,
//! so nothing is embedded. Text is encoded with WinAnsiEncoding, which covers
//! the Latin-1 characters used in Spanish (á, é, ñ, ¿, ...). Characters outside
//! WinAnsi are written as `?`.
//!
//! Widths come from the Adobe AFM metrics (1/1000 em) and are used for word
//! wrapping, justification and centering.

use lopdf::{Dictionary, Object};

/// Advance widths for Helvetica, codes 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    278, 278, 584, 584, 584, 556, 1015, // ':'..'@'
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    278, 278, 278, 469, 556, 333, // '['..'`'
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // 'a'..'m'
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // 'n'..'z'
    334, 260, 334, 584, // '{'..'~'
];

/// Advance widths for Helvetica-Bold, codes 32..=126.
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // '0'..'9'
    333, 333, 584, 584, 584, 611, 975, // ':'..'@'
    722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, // 'A'..'M'
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // 'N'..'Z'
    333, 278, 333, 584, 556, 333, // '['..'`'
    556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, // 'a'..'m'
    611, 611, 611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, // 'n'..'z'
    389, 280, 389, 584, // '{'..'~'
];

/// Width used for characters without a metric.
const FALLBACK_WIDTH: u16 = 556;

/// The three faces the report draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
}

impl StandardFont {
    pub const ALL: [Self; 3] = [Self::Helvetica, Self::HelveticaBold, Self::HelveticaOblique];

    /// PostScript name of the font.
    pub const fn base_font(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
            Self::HelveticaOblique => "Helvetica-Oblique",
        }
    }

    /// Name of the font in page resources (`/F1 8 Tf`).
    pub const fn resource_name(self) -> &'static str {
        match self {
            Self::Helvetica => "F1",
            Self::HelveticaBold => "F2",
            Self::HelveticaOblique => "F3",
        }
    }

    /// Advance width of a character in 1/1000 em.
    pub fn char_width(self, c: char) -> u16 {
        let table = match self {
            Self::Helvetica | Self::HelveticaOblique => &HELVETICA_WIDTHS,
            Self::HelveticaBold => &HELVETICA_BOLD_WIDTHS,
        };

        match c {
            ' '..='~' => table[(u32::from(c) - 32) as usize],
            '\u{a0}' => table[0],
            '–' => 556,
            '—' | '…' | '‰' => 1000,
            '‘' | '’' | '‚' => 222,
            '“' | '”' | '„' => 333,
            '¡' | '´' | '¨' => 333,
            '•' => 350,
            'º' | 'ª' => 365,
            _ => match fold_to_ascii(c) {
                Some(base) => table[(u32::from(base) - 32) as usize],
                None => FALLBACK_WIDTH,
            },
        }
    }

    /// Width of a string in points at the given size.
    pub fn string_width(self, text: &str, font_size: f32) -> f32 {
        let units: u32 = text.chars().map(|c| u32::from(self.char_width(c))).sum();
        #[allow(clippy::cast_precision_loss)] // widths stay far below f32 precision limits
        let units = units as f32;
        units * font_size / 1000.0
    }

    /// The font dictionary for document resources.
    pub fn dictionary(self) -> Dictionary {
        Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(self.base_font().as_bytes().to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ])
    }
}

/// Encode text as WinAnsi bytes, hex encoded for a content stream string
/// (without the angle brackets).
pub fn text_to_hex(text: &str) -> String {
    use std::fmt::Write;
    text.chars().fold(String::with_capacity(text.len() * 2), |mut acc, c| {
        let _ = write!(acc, "{:02X}", win_ansi_byte(c));
        acc
    })
}

/// Map a character to its WinAnsiEncoding code.
pub fn win_ansi_byte(c: char) -> u8 {
    match c {
        ' '..='~' | '\u{a0}'..='\u{ff}' => u8::try_from(u32::from(c)).unwrap_or(b'?'),
        '\t' => b' ',
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => b'?',
    }
}

/// Base letter of an accented Latin-1 letter, for width lookup.
fn fold_to_ascii(c: char) -> Option<char> {
    let base = match c {
        'À'..='Å' => 'A',
        'Ç' => 'C',
        'È'..='Ë' => 'E',
        'Ì'..='Ï' => 'I',
        'Ñ' => 'N',
        'Ò'..='Ö' | 'Ø' => 'O',
        'Ù'..='Ü' => 'U',
        'Ý' | 'Ÿ' => 'Y',
        'à'..='å' => 'a',
        'ç' => 'c',
        'è'..='ë' => 'e',
        'ì'..='ï' => 'i',
        'ñ' => 'n',
        'ò'..='ö' | 'ø' => 'o',
        'ù'..='ü' => 'u',
        'ý' | 'ÿ' => 'y',
        '¿' => '?',
        _ => return None,
    };
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_widths() {
        assert_eq!(StandardFont::Helvetica.char_width(' '), 278);
        assert_eq!(StandardFont::Helvetica.char_width('A'), 667);
        assert_eq!(StandardFont::Helvetica.char_width('~'), 584);
        assert_eq!(StandardFont::HelveticaBold.char_width('b'), 611);
        assert_eq!(StandardFont::HelveticaOblique.char_width('i'), 222);
    }

    #[test]
    fn test_accented_width_matches_base_letter() {
        let font = StandardFont::Helvetica;
        assert_eq!(font.char_width('á'), font.char_width('a'));
        assert_eq!(font.char_width('Ñ'), font.char_width('N'));
        assert_eq!(font.char_width('中'), FALLBACK_WIDTH);
    }

    #[test]
    fn test_string_width() {
        // "PDF" in Helvetica-Bold: 667 + 722 + 611 = 2000 units
        let w = StandardFont::HelveticaBold.string_width("PDF", 10.0);
        assert!((w - 20.0).abs() < 0.001);
        assert!(StandardFont::Helvetica.string_width("", 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_win_ansi_encoding() {
        assert_eq!(win_ansi_byte('A'), 0x41);
        assert_eq!(win_ansi_byte('é'), 0xE9);
        assert_eq!(win_ansi_byte('Ñ'), 0xD1);
        assert_eq!(win_ansi_byte('–'), 0x96);
        assert_eq!(win_ansi_byte('✓'), b'?');
        assert_eq!(text_to_hex("Aé"), "41E9");
    }

    #[test]
    fn test_resource_names_unique() {
        let mut names: Vec<_> = StandardFont::ALL.iter().map(|f| f.resource_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 3);
    }
}
