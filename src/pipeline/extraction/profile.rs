use super::types::ExtractionProfile;
use crate::models::DocumentKind;

/// Static extraction policy per document kind.
///
/// - LAUDO is authored digitally: the text layer is enough.
/// - PLS is often scanned and is mostly tables.
/// - ALVARÁ is often scanned but free-form.
pub const fn profile_for(kind: DocumentKind) -> ExtractionProfile {
    match kind {
        DocumentKind::PrimaryReport => ExtractionProfile {
            enable_ocr: false,
            enable_table_structure: false,
        },
        DocumentKind::ProgressSchedule => ExtractionProfile {
            enable_ocr: true,
            enable_table_structure: true,
        },
        DocumentKind::Permit => ExtractionProfile {
            enable_ocr: true,
            enable_table_structure: false,
        },
    }
}

/// True when extracting any of these kinds can fall back to OCR.
pub fn kinds_need_ocr<I>(kinds: I) -> bool
where
    I: IntoIterator<Item = DocumentKind>,
{
    kinds.into_iter().any(|k| profile_for(k).enable_ocr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_report_uses_text_layer_only() {
        let p = profile_for(DocumentKind::PrimaryReport);
        assert!(!p.enable_ocr);
        assert!(!p.enable_table_structure);
    }

    #[test]
    fn progress_schedule_uses_ocr_and_tables() {
        let p = profile_for(DocumentKind::ProgressSchedule);
        assert!(p.enable_ocr);
        assert!(p.enable_table_structure);
    }

    #[test]
    fn permit_uses_ocr_without_tables() {
        let p = profile_for(DocumentKind::Permit);
        assert!(p.enable_ocr);
        assert!(!p.enable_table_structure);
    }

    #[test]
    fn ocr_needed_only_with_scanned_kinds() {
        assert!(!kinds_need_ocr([DocumentKind::PrimaryReport]));
        assert!(kinds_need_ocr([DocumentKind::PrimaryReport, DocumentKind::Permit]));
        assert!(kinds_need_ocr(DocumentKind::ALL));
        assert!(!kinds_need_ocr(Vec::<DocumentKind>::new()));
    }
}
