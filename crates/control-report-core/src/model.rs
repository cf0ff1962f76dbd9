//! Case records and attachments handed to the generator by its collaborators.
//!
//! Field names are English; the keys used by the clinic's case store are
//! accepted as serde aliases so records can be decoded straight from its JSON.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One "operational control" case record.
///
/// Every field except `id` may be blank. Blank fields render as empty text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    /// Stable identifier, stamped on every page of the report
    pub id: u32,

    // I. User / location
    #[serde(default, alias = "ciudad")]
    pub city: Option<String>,
    #[serde(default, alias = "fecha_dia")]
    pub day: Option<u32>,
    #[serde(default, alias = "fecha_mes")]
    pub month: Option<u32>,
    #[serde(default, alias = "fecha_ano")]
    pub year: Option<u32>,
    #[serde(default, alias = "nombre_docente_responsable")]
    pub supervisor_name: Option<String>,
    #[serde(default, alias = "nombre_estudiante")]
    pub student_name: Option<String>,
    #[serde(default, alias = "area_consulta")]
    pub consultation_area: Option<String>,

    // II. Consultant profile
    #[serde(default, alias = "remitido_por")]
    pub referred_by: Option<String>,
    #[serde(default, alias = "correo_electronico")]
    pub email: Option<String>,
    #[serde(default, alias = "nombre_consultante")]
    pub consultant_name: Option<String>,
    #[serde(default, alias = "edad")]
    pub age: Option<u32>,
    #[serde(default, alias = "fecha_nacimiento_dia")]
    pub birth_day: Option<u32>,
    #[serde(default, alias = "fecha_nacimiento_mes")]
    pub birth_month: Option<u32>,
    #[serde(default, alias = "fecha_nacimiento_ano")]
    pub birth_year: Option<u32>,
    #[serde(default, alias = "lugar_nacimiento")]
    pub birth_place: Option<String>,
    #[serde(default, alias = "sexo")]
    pub sex: Option<String>,
    #[serde(default, alias = "tipo_documento")]
    pub document_type: Option<String>,
    #[serde(default, alias = "numero_documento")]
    pub document_number: Option<String>,
    #[serde(default, alias = "lugar_expedicion")]
    pub document_issued_in: Option<String>,
    #[serde(default, alias = "direccion")]
    pub address: Option<String>,
    #[serde(default, alias = "barrio")]
    pub neighborhood: Option<String>,
    #[serde(default, alias = "estrato")]
    pub stratum: Option<u32>,
    #[serde(default, alias = "numero_telefonico")]
    pub phone: Option<String>,
    #[serde(default, alias = "numero_celular")]
    pub mobile: Option<String>,
    #[serde(default, alias = "estado_civil")]
    pub marital_status: Option<String>,
    #[serde(default, alias = "escolaridad")]
    pub education: Option<String>,
    #[serde(default, alias = "profesion_oficio")]
    pub occupation: Option<String>,

    // III - V. Free text
    #[serde(default, alias = "descripcion_caso")]
    pub case_description: Option<String>,
    #[serde(default, alias = "concepto_estudiante")]
    pub student_assessment: Option<String>,
    #[serde(default, alias = "concepto_asesor")]
    pub advisor_assessment: Option<String>,
}

impl CaseRecord {
    /// A record with only its identifier set.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Decode a record from the case store's JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::MalformedRecord(e.to_string()))
    }

    pub fn sex(&self) -> Option<Sex> {
        self.sex.as_deref().and_then(Sex::parse)
    }

    pub fn document_type(&self) -> Option<DocumentType> {
        self.document_type.as_deref().and_then(DocumentType::parse)
    }
}

/// Render an optional value as form text: blank when unset.
pub fn field<T: ToString>(value: Option<&T>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

/// Render an optional string as form text: blank when unset.
pub fn text(value: Option<&String>) -> &str {
    value.map_or("", String::as_str)
}

/// Lowercase, without dots or whitespace. "C.C." and "cc" compare equal.
fn normalize_choice(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Sex indicator on the paper form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    pub const ALL: [Self; 2] = [Self::Female, Self::Male];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Female => "Femenino",
            Self::Male => "Masculino",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = normalize_choice(value);
        Self::ALL
            .into_iter()
            .find(|s| normalize_choice(s.label()) == value)
    }
}

/// Identity document type indicator on the paper form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    /// Tarjeta de identidad
    IdentityCard,
    /// Cédula de ciudadanía
    CitizenCard,
    Nuip,
}

impl DocumentType {
    pub const ALL: [Self; 3] = [Self::IdentityCard, Self::CitizenCard, Self::Nuip];

    pub const fn label(self) -> &'static str {
        match self {
            Self::IdentityCard => "T.I.",
            Self::CitizenCard => "C.C.",
            Self::Nuip => "NUIP",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = normalize_choice(value);
        Self::ALL
            .into_iter()
            .find(|t| normalize_choice(t.label()) == value)
    }
}

/// A file attached to a case.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Attachment {
    /// Original file name as uploaded
    pub filename: String,
    /// Declared MIME type
    pub content_type: String,
    /// Declared size in bytes
    pub size: u64,
    /// File content
    pub content: Vec<u8>,
}

impl Attachment {
    /// Build an attachment whose declared size matches its content.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            size: u64::try_from(content.len()).unwrap_or(u64::MAX),
            content,
        }
    }

    /// Only `.pdf` names are merged into the report, whatever the content.
    pub fn is_pdf(&self) -> bool {
        let name = self.filename.as_bytes();
        name.len() >= 4 && name[name.len() - 4..].eq_ignore_ascii_case(b".pdf")
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("content_len", &self.content.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf_case_insensitive() {
        assert!(Attachment::new("scan.pdf", "application/pdf", vec![]).is_pdf());
        assert!(Attachment::new("SCAN.PDF", "application/pdf", vec![]).is_pdf());
        assert!(Attachment::new("a.Pdf", "", vec![]).is_pdf());
        assert!(!Attachment::new("photo.png", "image/png", vec![]).is_pdf());
        assert!(!Attachment::new("pdf", "", vec![]).is_pdf());
        assert!(!Attachment::new("report.pdf.zip", "", vec![]).is_pdf());
    }

    #[test]
    fn test_attachment_size_from_content() {
        let a = Attachment::new("a.pdf", "application/pdf", vec![1, 2, 3]);
        assert_eq!(a.size, 3);
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!(Sex::parse("Femenino"), Some(Sex::Female));
        assert_eq!(Sex::parse(" masculino "), Some(Sex::Male));
        assert_eq!(Sex::parse("otro"), None);
    }

    #[test]
    fn test_document_type_parse() {
        assert_eq!(DocumentType::parse("C.C."), Some(DocumentType::CitizenCard));
        assert_eq!(DocumentType::parse("cc"), Some(DocumentType::CitizenCard));
        assert_eq!(DocumentType::parse("T.I."), Some(DocumentType::IdentityCard));
        assert_eq!(DocumentType::parse("nuip"), Some(DocumentType::Nuip));
        assert_eq!(DocumentType::parse("passport"), None);
    }

    #[test]
    fn test_from_json_with_store_keys() {
        let case = CaseRecord::from_json(
            r#"{
                "id": 42,
                "ciudad": "Bogota D.C",
                "fecha_dia": 5,
                "nombre_estudiante": "Ana Perez",
                "sexo": "Femenino",
                "estrato": null
            }"#,
        )
        .unwrap();

        assert_eq!(case.id, 42);
        assert_eq!(case.city.as_deref(), Some("Bogota D.C"));
        assert_eq!(case.day, Some(5));
        assert_eq!(case.student_name.as_deref(), Some("Ana Perez"));
        assert_eq!(case.sex(), Some(Sex::Female));
        assert_eq!(case.stratum, None);
    }

    #[test]
    fn test_from_json_requires_id() {
        assert!(matches!(
            CaseRecord::from_json(r#"{"ciudad": "Bogota"}"#),
            Err(Error::MalformedRecord(_))
        ));
        assert!(matches!(
            CaseRecord::from_json(r#"{"id": null}"#),
            Err(Error::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_field_rendering() {
        assert_eq!(field::<u32>(None), "");
        assert_eq!(field(Some(&7_u32)), "7");
        assert_eq!(text(None), "");
        assert_eq!(text(Some(&"x".to_string())), "x");
    }
}
