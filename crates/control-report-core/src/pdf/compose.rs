//! Document Composer: case record in, serialized report out.

use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;

use crate::assets::LogoImage;
use crate::error::{Error, Result};
use crate::model::CaseRecord;
use super::document::ComposedDocument;
use super::fonts::StandardFont;
use super::geometry::PageGeometry;
use super::layout::{Block, FinishedPage, Flow, ImageBlock, PageDecorator};
use super::sections::{LOGO_SIZE, ReportSections};
use super::stamp::IdentifierStamp;

/// Resource name of the logo image XObject.
const LOGO_RESOURCE: &str = "Im1";

const PRODUCER: &str = "control-report";

/// Lays out and serializes case reports.
///
/// Holds no per-call state; one composer serves any number of threads.
#[derive(Debug, Clone)]
pub struct Composer {
    geometry: PageGeometry,
    logo: Option<LogoImage>,
}

impl Composer {
    pub fn new(geometry: PageGeometry, logo: Option<LogoImage>) -> Result<Self> {
        geometry.validate()?;
        Ok(Self { geometry, logo })
    }

    pub const fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub const fn has_logo(&self) -> bool {
        self.logo.is_some()
    }

    /// Compose the report for one case.
    ///
    /// The identifier stamp is applied to every page at emission.
    pub fn compose(&self, case: &CaseRecord) -> Result<ComposedDocument> {
        let logo = self.logo.as_ref().map(|_| ImageBlock {
            name: LOGO_RESOURCE.to_string(),
            width: LOGO_SIZE,
            height: LOGO_SIZE,
        });
        let blocks = ReportSections::new(case, self.geometry, logo).build()?;

        let stamp: Box<dyn PageDecorator> = Box::new(IdentifierStamp::new(case.id));
        let pages = self.paginate(&blocks, vec![stamp])?;
        let page_count = pages.len();
        debug!(case_id = case.id, pages = page_count, "Laid out report");

        let bytes = self.serialize(case.id, pages)?;
        Ok(ComposedDocument::new(case.id, bytes, page_count))
    }

    fn paginate(
        &self,
        blocks: &[Block],
        decorators: Vec<Box<dyn PageDecorator>>,
    ) -> Result<Vec<FinishedPage>> {
        let mut flow = Flow::new(self.geometry, decorators)?;
        for block in blocks {
            flow.push(block)?;
        }
        Ok(flow.finish())
    }

    /// Build the PDF object graph and write it out.
    ///
    /// No timestamps or random IDs are written, so the same record always
    /// yields the same bytes.
    fn serialize(&self, case_id: u32, pages: Vec<FinishedPage>) -> Result<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut fonts = Dictionary::new();
        for font in StandardFont::ALL {
            let font_id = doc.add_object(font.dictionary());
            fonts.set(font.resource_name(), Object::Reference(font_id));
        }
        let mut resources = Dictionary::from_iter([("Font", Object::Dictionary(fonts))]);
        if let Some(logo) = &self.logo {
            let image_id = logo.embed(&mut doc);
            resources.set(
                "XObject",
                Object::Dictionary(Dictionary::from_iter([(
                    LOGO_RESOURCE,
                    Object::Reference(image_id),
                )])),
            );
        }

        let media_box = Object::Array(vec![
            0.into(),
            0.into(),
            self.geometry.width.into(),
            self.geometry.height.into(),
        ]);

        let mut kids = Vec::with_capacity(pages.len());
        for page in pages {
            let content = Stream::new(Dictionary::new(), page.canvas.into_bytes());
            let content_id = doc.add_object(content);
            let page_id = doc.add_object(Dictionary::from_iter([
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                ("MediaBox", media_box.clone()),
                ("Resources", Object::Dictionary(resources.clone())),
                ("Contents", Object::Reference(content_id)),
            ]));
            kids.push(Object::Reference(page_id));
        }

        let count = i64::try_from(kids.len())
            .map_err(|_| Error::PdfSave("too many pages".to_string()))?;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
            ])),
        );

        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let info_id = doc.add_object(Dictionary::from_iter([
            (
                "Title",
                Object::string_literal(format!(
                    "Control operativo {}",
                    IdentifierStamp::label_for(case_id)
                )),
            ),
            ("Producer", Object::string_literal(PRODUCER)),
        ]));
        doc.trailer.set("Info", Object::Reference(info_id));

        doc.compress();

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save PDF: {e}")))?;

        Ok(output)
    }
}
