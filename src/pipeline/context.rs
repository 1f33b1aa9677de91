use crate::pipeline::extraction::ExtractedText;

/// Delimiter line announcing one document's section.
pub fn section_header(text: &ExtractedText) -> String {
    format!("--- {} ---", text.kind.label())
}

/// Merge per-document texts into one labeled context blob.
///
/// Sections follow the document kind order (LAUDO, PLS, ALVARÁ) regardless
/// of input order and are separated by a newline. No input, no context.
pub fn assemble(mut texts: Vec<ExtractedText>) -> String {
    texts.sort_by_key(|t| t.kind);

    let context = texts
        .iter()
        .map(|t| format!("{}\n{}\n", section_header(t), t.text))
        .collect::<Vec<_>>()
        .join("\n");

    tracing::debug!(
        sections = texts.len(),
        chars = context.chars().count(),
        "Context assembled"
    );
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentKind;

    fn text(kind: DocumentKind, body: &str) -> ExtractedText {
        ExtractedText {
            kind,
            text: body.to_string(),
            truncated: false,
        }
    }

    #[test]
    fn empty_input_gives_empty_context() {
        assert_eq!(assemble(Vec::new()), "");
    }

    #[test]
    fn single_document() {
        let ctx = assemble(vec![text(DocumentKind::PrimaryReport, "laudo")]);
        assert_eq!(ctx, "--- LAUDO ---\nlaudo\n");
    }

    #[test]
    fn sections_follow_kind_order() {
        let ctx = assemble(vec![
            text(DocumentKind::Permit, "alvara"),
            text(DocumentKind::PrimaryReport, "laudo"),
            text(DocumentKind::ProgressSchedule, "pls"),
        ]);
        assert_eq!(
            ctx,
            "--- LAUDO ---\nlaudo\n\n--- PLS ---\npls\n\n--- ALVARÁ ---\nalvara\n"
        );
    }

    #[test]
    fn assembly_is_deterministic() {
        let build = || {
            assemble(vec![
                text(DocumentKind::ProgressSchedule, "b"),
                text(DocumentKind::PrimaryReport, "a"),
            ])
        };
        assert_eq!(build(), build());
    }
}
