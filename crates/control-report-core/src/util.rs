//! Utility functions shared across the crate.

use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDate};

use crate::model::CaseRecord;

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Download file name for a case report: `control_operativo_<id>_<YYYYMMDD>.pdf`.
///
/// Uses the record's date parts when all three form a valid date, otherwise today.
pub fn report_filename(case: &CaseRecord) -> String {
    report_filename_on(case, Local::now().date_naive())
}

/// Same as [`report_filename`] with an explicit fallback date.
pub fn report_filename_on(case: &CaseRecord, fallback: NaiveDate) -> String {
    let date = match (case.year, case.month, case.day) {
        (Some(y), Some(m), Some(d)) => i32::try_from(y)
            .ok()
            .and_then(|y| NaiveDate::from_ymd_opt(y, m, d))
            .unwrap_or(fallback),
        _ => fallback,
    };

    format!(
        "control_operativo_{}_{:04}{:02}{:02}.pdf",
        case.id,
        date.year(),
        date.month(),
        date.day()
    )
}
