//! The sections of the operational control form.
//!
//! Sections only produce blocks; pagination and per-page marks belong to the
//! flow. The grid follows the pre-printed paper form, so the column
//! fractions below must not be "tidied up".

use crate::error::Result;
use crate::model::{CaseRecord, DocumentType, Sex, field, text};
use super::canvas::Color;
use super::fonts::StandardFont;
use super::geometry::{INCH, PageGeometry};
use super::layout::{
    Align, Block, BoxPosition, Cell, ChoiceGroup, ImageBlock, Padding, Paragraph, Row, Run,
    Table, TableStyle, TextStyle, VAlign,
};

// =============================================================================
// Fixed Text
// =============================================================================

pub const INSTITUTION: &str = "UNIVERSIDAD COLEGIO MAYOR DE CUNDINAMARCA";
pub const FACULTY: &str = "FACULTAD DE DERECHO - CONSULTORIO JURÍDICO";
pub const CAMPUS: &str = "Sede Universidad Pública de Kennedy - Tintal";
pub const APPROVAL: &str = "Aprobado Acuerdo 10/28/2002 Sala de Gobierno HTSDJ de Bogotá";
pub const TITLE: &str = "CONTROL OPERATIVO DE CONSULTA JURÍDICA";

/// The user's declaration, identical on every report.
pub const DECLARATION_CLAUSES: [&str; 5] = [
    "Que la información antes suministrada se puede verificar y si se comprueba que \
     falté a la verdad y omití información, acepto el archivo y renuncia del caso por \
     parte del CONSULTORIO JURÍDICO de la UNIVERSIDAD COLEGIO MAYOR DE CUNDINAMARCA.",
    "Que fui informado, que el compromiso profesional se inicia con previa aceptación \
     del caso y la entrevista sin compromiso a la UNIVERSIDAD COLEGIO (CONSULTORIO \
     JURÍDICO), ni a ninguno de los profesionales que allí labora a brindar asesoría \
     del caso.",
    "Autorizo que en caso de no aportar los documentos requeridos en un término \
     prudencial o de incumplir en por lo menos a dos citas, o comete alguna falta del \
     personal que me atiende será ARCHIVADO.",
    "Igualmente autorizo a la UNIVERSIDAD COLEGIO MAYOR DE CUNDINAMARCA (CONSULTORIO \
     JURÍDICO), para utilizar la información confidencial suministrada y requerida, con \
     fines académicos e investigativos.",
    "Manifiesto que fui informado en el CONSULTORIO JURÍDICO de la UNIVERSIDAD COLEGIO \
     MAYOR DE CUNDINAMARCA de la existencia de un equipo interdisciplinario que permite \
     ofrecer una atención integral a los usuarios con el fin de mejorar la calidad de \
     vida a nivel individual y/o familiar mediante un seguimiento de los casos \
     requeridos.",
];

pub const FOOTER_ADDRESS: &str = "Calle 5C No. 94I – 25 Edificio Nuevo Piso 4 – UPK - Bogotá, D.C.";
pub const FOOTER_EMAIL: &str = "Correo: consultoriojuridico.kennedy@unicolmayor.edu.co";

/// Wide gap inside a single cell; non-breaking so it survives line breaking.
const GAP: &str = " \u{a0}\u{a0}\u{a0}";

// =============================================================================
// Styles
// =============================================================================

const UNIVERSITY: TextStyle = TextStyle::new(9.0, 10.8).align(Align::Center);
const CAMPUS_STYLE: TextStyle = TextStyle::new(9.0, 10.8).align(Align::Center);
const APPROVAL_STYLE: TextStyle = TextStyle::new(7.0, 8.4).align(Align::Center);
const TITLE_STYLE: TextStyle = TextStyle::new(11.0, 13.2).align(Align::Center);
const SECTION_TITLE: TextStyle = TextStyle::new(9.0, 10.8);
const FIELD: TextStyle = TextStyle::new(8.0, 9.6);
const PARAGRAPH: TextStyle = TextStyle::new(8.0, 10.0).align(Align::Justify);
const DECLARATION: TextStyle = TextStyle::new(7.0, 9.0);
const USER_SIGNATURE: TextStyle = TextStyle::new(10.0, 12.0).align(Align::Center);
const FOOTER: TextStyle = TextStyle::new(8.0, 9.6)
    .align(Align::Center)
    .color(Color::DARK_GREY);

const FIELD_SIZE: f32 = 8.0;

const SECTION_HEADER_TABLE: TableStyle = TableStyle {
    grid: Some(1.0),
    background: Some(Color::LIGHT_GREY),
    padding: Padding::new(3.0, 6.0, 1.0, 1.0),
    valign: VAlign::Middle,
};

const FIELD_TABLE: TableStyle = TableStyle {
    grid: Some(1.0),
    background: None,
    padding: Padding::new(3.0, 6.0, 1.0, 1.0),
    valign: VAlign::Middle,
};

const SIGNATURE_TABLE: TableStyle = TableStyle {
    padding: Padding::new(3.0, 6.0, 3.0, 3.0),
    ..FIELD_TABLE
};

/// Logo box edge.
pub const LOGO_SIZE: f32 = INCH;

/// Minimum height of the case description box.
const DESCRIPTION_HEIGHT: f32 = 1.5 * INCH;

/// Minimum height of the assessment boxes.
const ASSESSMENT_HEIGHT: f32 = 1.3 * INCH;

const SECTION_GAP: f32 = 3.0;

// =============================================================================
// Builder
// =============================================================================

/// Lays the form out as a sequence of blocks.
pub struct ReportSections<'a> {
    case: &'a CaseRecord,
    geometry: PageGeometry,
    logo: Option<ImageBlock>,
    blocks: Vec<Block>,
}

impl<'a> ReportSections<'a> {
    /// `logo` is the registered logo image, if any.
    pub fn new(case: &'a CaseRecord, geometry: PageGeometry, logo: Option<ImageBlock>) -> Self {
        Self {
            case,
            geometry,
            logo,
            blocks: Vec::new(),
        }
    }

    /// All sections in form order.
    pub fn build(mut self) -> Result<Vec<Block>> {
        self.header();
        self.user_data()?;
        self.consultant_profile()?;
        self.case_description();
        self.student_assessment()?;
        self.advisor_assessment()?;
        self.blocks.push(Block::PageBreak);
        self.user_declaration()?;
        Ok(self.blocks)
    }

    fn push_table(&mut self, fractions: &[f32], rows: Vec<Row>, style: TableStyle) -> Result<()> {
        let columns = self.geometry.columns(fractions)?;
        self.blocks.push(Block::Table(Table::new(columns, rows, style)));
        Ok(())
    }

    fn full_width(&mut self, rows: Vec<Row>, style: TableStyle) {
        let columns = vec![self.geometry.frame_width()];
        self.blocks.push(Block::Table(Table::new(columns, rows, style)));
    }

    fn centered(&mut self, text: &str, font: StandardFont, style: TextStyle) {
        self.blocks
            .push(Block::Paragraph(Paragraph::plain(text, font, style)));
    }

    fn section_title(&mut self, title: &str) {
        let cell = Cell::text(Paragraph::plain(title, StandardFont::HelveticaBold, SECTION_TITLE));
        self.full_width(vec![Row::new(vec![cell])], SECTION_HEADER_TABLE);
    }

    fn header(&mut self) {
        if let Some(logo) = self.logo.take() {
            self.blocks.push(Block::Image(logo));
            self.blocks.push(Block::Spacer(2.0));
        }

        self.centered(INSTITUTION, StandardFont::HelveticaBold, UNIVERSITY);
        self.blocks.push(Block::Spacer(2.0));
        self.centered(FACULTY, StandardFont::HelveticaBold, UNIVERSITY);
        self.blocks.push(Block::Spacer(2.0));
        self.centered(CAMPUS, StandardFont::Helvetica, CAMPUS_STYLE);
        self.centered(APPROVAL, StandardFont::HelveticaOblique, APPROVAL_STYLE);
        self.blocks.push(Block::Spacer(2.0));
        self.centered(TITLE, StandardFont::HelveticaBold, TITLE_STYLE);
        self.blocks.push(Block::Spacer(8.0));
    }

    /// I. City, date parts, supervisor, student, area.
    fn user_data(&mut self) -> Result<()> {
        let case = self.case;
        self.section_title("I. DATOS DEL USUARIO");

        let date_style = TableStyle {
            padding: Padding::new(6.0, 6.0, 2.0, 2.0),
            ..FIELD_TABLE
        };
        self.push_table(
            &[0.538, 0.154, 0.154, 0.154],
            vec![
                Row::new(vec![
                    field_cell(format!("Ciudad: {}", text(case.city.as_ref()))).spanning(2),
                    field_cell("Día"),
                    field_cell("Mes"),
                    field_cell("Año"),
                ]),
                Row::new(vec![
                    Cell::covered(),
                    field_cell(field(case.day.as_ref())),
                    field_cell(field(case.month.as_ref())),
                    field_cell(field(case.year.as_ref())),
                ]),
            ],
            date_style,
        )?;

        let info_style = TableStyle {
            padding: Padding::new(3.0, 6.0, 2.0, 2.0),
            ..FIELD_TABLE
        };
        self.full_width(
            vec![
                single(format!(
                    "Nombre del Docente Responsable: {}",
                    text(case.supervisor_name.as_ref())
                )),
                single(format!("Nombre del Estudiante: {}", text(case.student_name.as_ref()))),
                single(format!("Área de Consulta: {}", text(case.consultation_area.as_ref()))),
            ],
            info_style,
        );

        self.blocks.push(Block::Spacer(SECTION_GAP));
        Ok(())
    }

    /// II. Consultant demographics.
    fn consultant_profile(&mut self) -> Result<()> {
        let case = self.case;
        self.section_title("II. INFORMACIÓN GENERAL DEL CONSULTANTE");

        self.full_width(
            vec![
                single(format!("Remitido por: {}", text(case.referred_by.as_ref()))),
                single(format!("Correo electrónico: {}", text(case.email.as_ref()))),
            ],
            FIELD_TABLE,
        );

        self.push_table(
            &[0.615, 0.385],
            vec![Row::new(vec![
                field_cell(format!("1. Nombre: {}", text(case.consultant_name.as_ref()))),
                field_cell(format!("2. Edad: {}", field(case.age.as_ref()))),
            ])],
            FIELD_TABLE,
        )?;

        self.push_table(
            &[0.462, 0.308, 0.231],
            vec![Row::new(vec![
                field_cell(format!(
                    "3. Fecha de nacimiento{GAP}Día: {}{GAP}Mes: {}{GAP}Año: {}",
                    field(case.birth_day.as_ref()),
                    field(case.birth_month.as_ref()),
                    field(case.birth_year.as_ref()),
                )),
                field_cell(format!(
                    "4. Lugar de nacimiento: {}",
                    text(case.birth_place.as_ref())
                )),
                field_cell("5. Sexo"),
            ])],
            FIELD_TABLE,
        )?;

        let sex = case.sex();
        self.push_table(
            &[0.692, 0.308],
            vec![Row::new(vec![
                Cell::empty(),
                Cell::choices(ChoiceGroup::new(
                    Sex::ALL.map(Sex::label),
                    |label| sex.is_some_and(|s| s.label() == label),
                    BoxPosition::After,
                    FIELD_SIZE,
                )),
            ])],
            FIELD_TABLE,
        )?;

        self.push_table(
            &[0.5, 0.5],
            vec![Row::new(vec![
                field_cell(format!(
                    "7. Número de documento: {}",
                    text(case.document_number.as_ref())
                )),
                field_cell(format!(
                    "8. Lugar de expedición: {}",
                    text(case.document_issued_in.as_ref())
                )),
            ])],
            FIELD_TABLE,
        )?;

        let document_type = case.document_type();
        self.push_table(
            &[0.5, 0.5],
            vec![Row::new(vec![
                Cell::choices(ChoiceGroup::new(
                    DocumentType::ALL.map(DocumentType::label),
                    |label| document_type.is_some_and(|t| t.label() == label),
                    BoxPosition::Before,
                    FIELD_SIZE,
                )),
                Cell::empty(),
            ])],
            FIELD_TABLE,
        )?;

        self.push_table(
            &[0.385, 0.385, 0.231],
            vec![Row::new(vec![
                field_cell(format!("9. Dirección: {}", text(case.address.as_ref()))),
                field_cell(format!("10. Barrio: {}", text(case.neighborhood.as_ref()))),
                field_cell(format!("Estrato: {}", field(case.stratum.as_ref()))),
            ])],
            FIELD_TABLE,
        )?;

        self.push_table(
            &[0.5, 0.5],
            vec![Row::new(vec![
                field_cell(format!("11. Número telefónico: {}", text(case.phone.as_ref()))),
                field_cell(format!("12. Número celular: {}", text(case.mobile.as_ref()))),
            ])],
            FIELD_TABLE,
        )?;

        self.push_table(
            &[0.5, 0.5],
            vec![Row::new(vec![
                field_cell(format!(
                    "13. Estado civil actual: {}",
                    text(case.marital_status.as_ref())
                )),
                field_cell(format!(
                    "15. Profesión u oficio: {}",
                    text(case.occupation.as_ref())
                )),
            ])],
            FIELD_TABLE,
        )?;

        self.full_width(
            vec![single(format!("14. Escolaridad: {}", text(case.education.as_ref())))],
            FIELD_TABLE,
        );

        self.blocks.push(Block::Spacer(SECTION_GAP));
        Ok(())
    }

    /// III. Free-text description of the case.
    fn case_description(&mut self) {
        self.section_title("III. BREVE DESCRIPCIÓN DEL CASO");
        self.text_box(
            text(self.case.case_description.as_ref()),
            DESCRIPTION_HEIGHT,
            Padding::new(4.0, 4.0, 2.0, 4.0),
        );
        self.blocks.push(Block::Spacer(SECTION_GAP));
    }

    /// IV. Student's assessment and signature.
    fn student_assessment(&mut self) -> Result<()> {
        self.section_title("IV. CONCEPTO DEL ESTUDIANTE");
        self.text_box(
            text(self.case.student_assessment.as_ref()),
            ASSESSMENT_HEIGHT,
            Padding::new(4.0, 4.0, 3.0, 3.0),
        );
        self.signature_row("Firma Estudiante:")?;
        self.blocks.push(Block::Spacer(SECTION_GAP));
        Ok(())
    }

    /// V. Advisor's assessment and signature.
    fn advisor_assessment(&mut self) -> Result<()> {
        self.section_title("V. CONCEPTO DEL ASESOR JURÍDICO");
        self.text_box(
            text(self.case.advisor_assessment.as_ref()),
            ASSESSMENT_HEIGHT,
            Padding::new(4.0, 4.0, 3.0, 3.0),
        );
        self.signature_row("Firma Asesor:")
    }

    /// VI. Fixed declaration, user signature and institutional footer.
    fn user_declaration(&mut self) -> Result<()> {
        self.section_title("VI. DECLARACIÓN DEL USUARIO");

        let mut runs = Vec::with_capacity(DECLARATION_CLAUSES.len() * 2);
        for (i, clause) in DECLARATION_CLAUSES.iter().enumerate() {
            let separator = if i + 1 < DECLARATION_CLAUSES.len() { "\n\n" } else { "" };
            runs.push(Run::bold(format!("{}. ", i + 1)));
            runs.push(Run::regular(format!("{clause}{separator}")));
        }
        self.full_width(
            vec![Row::new(vec![Cell::text(Paragraph::new(runs, DECLARATION))])],
            TableStyle {
                grid: Some(1.0),
                background: None,
                padding: Padding::new(12.0, 12.0, 12.0, 12.0),
                valign: VAlign::Top,
            },
        );

        self.blocks.push(Block::Spacer(24.0));
        self.push_table(
            &[0.6, 0.4],
            vec![Row::new(vec![
                Cell::empty(),
                Cell::text(Paragraph::plain(
                    "Firma del Usuario",
                    StandardFont::HelveticaBold,
                    USER_SIGNATURE,
                ))
                .rule_above(1.5),
            ])],
            TableStyle {
                grid: None,
                background: None,
                padding: Padding::new(6.0, 6.0, 15.0, 8.0),
                valign: VAlign::Top,
            },
        )?;

        self.blocks.push(Block::Spacer(18.0));
        self.centered(
            &format!("{FOOTER_ADDRESS}\n{FOOTER_EMAIL}"),
            StandardFont::HelveticaOblique,
            FOOTER,
        );
        Ok(())
    }

    /// A bordered, justified text box that keeps its height when empty.
    fn text_box(&mut self, content: &str, min_height: f32, padding: Padding) {
        let paragraph = Paragraph::plain(content, StandardFont::Helvetica, PARAGRAPH);
        self.full_width(
            vec![Row::new(vec![Cell::text(paragraph)]).min_height(min_height)],
            TableStyle {
                grid: Some(1.0),
                background: None,
                padding,
                valign: VAlign::Top,
            },
        );
    }

    fn signature_row(&mut self, label: &str) -> Result<()> {
        self.push_table(
            &[0.769, 0.231],
            vec![Row::new(vec![Cell::empty(), field_cell(label)])],
            SIGNATURE_TABLE,
        )
    }
}

fn field_cell(content: impl Into<String>) -> Cell {
    Cell::text(Paragraph::plain(content, StandardFont::Helvetica, FIELD))
}

fn single(content: String) -> Row {
    Row::new(vec![field_cell(content)])
}
