use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three document slots of a run, in context order.
///
/// The derived `Ord` is load-bearing: the context assembler and the
/// extraction loop both walk documents in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Technical inspection report (LAUDO). Mandatory.
    PrimaryReport,
    /// Progress measurement schedule (PLS). Optional.
    ProgressSchedule,
    /// Municipal construction permit (ALVARÁ). Optional.
    Permit,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 3] = [
        DocumentKind::PrimaryReport,
        DocumentKind::ProgressSchedule,
        DocumentKind::Permit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryReport => "primary_report",
            Self::ProgressSchedule => "progress_schedule",
            Self::Permit => "permit",
        }
    }

    /// Delimiter label used in the assembled context.
    pub fn label(&self) -> &'static str {
        match self {
            Self::PrimaryReport => "LAUDO",
            Self::ProgressSchedule => "PLS",
            Self::Permit => "ALVARÁ",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for DocumentKind {
    type Err = SubmissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary_report" | "laudo" => Ok(Self::PrimaryReport),
            "progress_schedule" | "pls" => Ok(Self::ProgressSchedule),
            "permit" | "alvara" | "alvará" => Ok(Self::Permit),
            other => Err(SubmissionError::UnknownKind(other.to_string())),
        }
    }
}

/// One raw document as submitted. Consumed exactly once by extraction.
#[derive(Clone)]
pub struct SourceDocument {
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self { kind, bytes }
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("kind", &self.kind)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("The primary report (LAUDO) is mandatory")]
    MissingPrimaryReport,

    #[error("More than one {0} document submitted")]
    DuplicateKind(DocumentKind),

    #[error("Unknown document kind: {0}")]
    UnknownKind(String),
}

/// The documents of a single run: a mandatory primary report plus at most
/// one document of each optional kind.
#[derive(Debug, Clone)]
pub struct Submission {
    documents: BTreeMap<DocumentKind, SourceDocument>,
}

impl Submission {
    pub fn new(primary_report: Vec<u8>) -> Self {
        let mut documents = BTreeMap::new();
        documents.insert(
            DocumentKind::PrimaryReport,
            SourceDocument::new(DocumentKind::PrimaryReport, primary_report),
        );
        Self { documents }
    }

    pub fn with_progress_schedule(mut self, bytes: Vec<u8>) -> Self {
        self.documents.insert(
            DocumentKind::ProgressSchedule,
            SourceDocument::new(DocumentKind::ProgressSchedule, bytes),
        );
        self
    }

    pub fn with_permit(mut self, bytes: Vec<u8>) -> Self {
        self.documents.insert(
            DocumentKind::Permit,
            SourceDocument::new(DocumentKind::Permit, bytes),
        );
        self
    }

    /// Build from an arbitrary list, rejecting duplicates and a missing primary report.
    pub fn from_documents(docs: Vec<SourceDocument>) -> Result<Self, SubmissionError> {
        let mut documents = BTreeMap::new();
        for doc in docs {
            let kind = doc.kind;
            if documents.insert(kind, doc).is_some() {
                return Err(SubmissionError::DuplicateKind(kind));
            }
        }
        if !documents.contains_key(&DocumentKind::PrimaryReport) {
            return Err(SubmissionError::MissingPrimaryReport);
        }
        Ok(Self { documents })
    }

    pub fn presence(&self) -> DocumentPresence {
        DocumentPresence {
            has_progress_schedule: self.documents.contains_key(&DocumentKind::ProgressSchedule),
            has_permit: self.documents.contains_key(&DocumentKind::Permit),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Kinds present, in kind order.
    pub fn kinds(&self) -> impl Iterator<Item = DocumentKind> + '_ {
        self.documents.keys().copied()
    }

    /// Documents in kind order, handing ownership to the caller.
    pub fn into_documents(self) -> impl Iterator<Item = SourceDocument> {
        self.documents.into_values()
    }
}

/// Which optional documents were provided. Drives presence-derived cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentPresence {
    pub has_progress_schedule: bool,
    pub has_permit: bool,
}

impl DocumentPresence {
    pub fn has(&self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::PrimaryReport => true,
            DocumentKind::ProgressSchedule => self.has_progress_schedule,
            DocumentKind::Permit => self.has_permit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_order_primary_first() {
        let mut kinds = vec![
            DocumentKind::Permit,
            DocumentKind::PrimaryReport,
            DocumentKind::ProgressSchedule,
        ];
        kinds.sort();
        assert_eq!(kinds, DocumentKind::ALL.to_vec());
    }

    #[test]
    fn kind_parses_portuguese_aliases() {
        assert_eq!("LAUDO".parse::<DocumentKind>().unwrap(), DocumentKind::PrimaryReport);
        assert_eq!("pls".parse::<DocumentKind>().unwrap(), DocumentKind::ProgressSchedule);
        assert_eq!("Alvará".parse::<DocumentKind>().unwrap(), DocumentKind::Permit);
        assert!("invoice".parse::<DocumentKind>().is_err());
    }

    #[test]
    fn submission_iterates_in_kind_order() {
        let submission = Submission::new(b"laudo".to_vec())
            .with_permit(b"alvara".to_vec())
            .with_progress_schedule(b"pls".to_vec());
        assert_eq!(submission.kinds().collect::<Vec<_>>(), DocumentKind::ALL.to_vec());
        let kinds: Vec<_> = submission.into_documents().map(|d| d.kind).collect();
        assert_eq!(kinds, DocumentKind::ALL.to_vec());
    }

    #[test]
    fn presence_reflects_optional_documents() {
        let only_primary = Submission::new(vec![1]);
        assert_eq!(only_primary.presence(), DocumentPresence::default());

        let with_permit = Submission::new(vec![1]).with_permit(vec![2]);
        let presence = with_permit.presence();
        assert!(presence.has_permit);
        assert!(!presence.has_progress_schedule);
        assert!(presence.has(DocumentKind::PrimaryReport));
    }

    #[test]
    fn from_documents_requires_primary_report() {
        let err = Submission::from_documents(vec![SourceDocument::new(
            DocumentKind::Permit,
            vec![1],
        )])
        .unwrap_err();
        assert_eq!(err, SubmissionError::MissingPrimaryReport);
    }

    #[test]
    fn from_documents_rejects_duplicates() {
        let err = Submission::from_documents(vec![
            SourceDocument::new(DocumentKind::PrimaryReport, vec![1]),
            SourceDocument::new(DocumentKind::ProgressSchedule, vec![2]),
            SourceDocument::new(DocumentKind::ProgressSchedule, vec![3]),
        ])
        .unwrap_err();
        assert_eq!(err, SubmissionError::DuplicateKind(DocumentKind::ProgressSchedule));
    }

    #[test]
    fn debug_hides_document_bytes() {
        let doc = SourceDocument::new(DocumentKind::PrimaryReport, vec![0; 42]);
        let rendered = format!("{doc:?}");
        assert!(rendered.contains("42"));
        assert!(!rendered.contains("0, 0"));
    }
}
