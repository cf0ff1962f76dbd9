mod canvas;
mod compose;
mod document;
mod fonts;
mod geometry;
pub mod layout;
pub mod merge;
pub mod sections;
mod stamp;

pub use canvas::{Canvas, Color, TextSegment};
pub use compose::Composer;
pub use document::{ComposedDocument, page_count};
pub use fonts::StandardFont;
pub use geometry::{INCH, PageGeometry};
pub use merge::{
    AttachmentMerger, AttachmentOutcome, AttachmentStatus, MergeOutcome, MergeSummary, SkipReason,
};
pub use sections::ReportSections;
pub use stamp::IdentifierStamp;
