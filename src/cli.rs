//! Non-interactive command-line driver.

use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use crate::capabilities::{probe, DependencyUnavailable};
use crate::config::{ConfigError, Settings};
use crate::models::{DocumentKind, SourceDocument, Submission, SubmissionError};
use crate::pipeline::mapping::{SchemaError, TemplateProfile};
use crate::pipeline::structuring::InferenceError;
use crate::pipeline::workbook::{OutputSerializer, WorkbookError, XlsmTemplate};
use crate::pipeline::{build_pipeline, PipelineFailure};
use crate::registry::{ProfessionalRegistry, RegistryError};

#[derive(Parser, Debug)]
#[command(name = "raefill")]
#[command(about = "Fill the RAE spreadsheet template from inspection documents")]
#[command(version)]
pub struct Cli {
    /// Primary inspection report (LAUDO), PDF
    #[arg(long, required_unless_present = "list_professionals")]
    pub laudo: Option<PathBuf>,

    /// Progress measurement report (PLS), PDF
    #[arg(long)]
    pub pls: Option<PathBuf>,

    /// Construction permit (ALVARÁ), PDF
    #[arg(long)]
    pub alvara: Option<PathBuf>,

    /// RAE template workbook (.xlsm)
    #[arg(long, required_unless_present = "list_professionals")]
    pub template: Option<PathBuf>,

    /// Responsible professional, by registry display name
    #[arg(long, required_unless_present = "list_professionals")]
    pub professional: Option<String>,

    /// Settings file (default: <config_dir>/raefill/settings.toml)
    #[arg(long, env = "RAEFILL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Template profile overriding the bundled one
    #[arg(long)]
    pub profile: Option<PathBuf>,

    /// Professional registry file
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Output workbook path
    #[arg(short, long, default_value = "RAE_FINAL.xlsm")]
    pub output: PathBuf,

    /// Print registered professionals and exit
    #[arg(long)]
    pub list_professionals: bool,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Dependency(#[from] DependencyUnavailable),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Workbook(#[from] WorkbookError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Pipeline(#[from] PipelineFailure),

    #[error("No registry file configured (use --registry)")]
    NoRegistry,

    #[error("Missing required argument --{0}")]
    MissingArgument(&'static str),

    #[error("Cannot read {path}: {source}")]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {path}: {source}")]
    WriteOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    /// One line for the terminal.
    pub fn user_message(&self) -> String {
        match self {
            CliError::Pipeline(failure) => failure.user_message(),
            other => other.to_string(),
        }
    }
}

pub fn run(cli: Cli) -> Result<(), CliError> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if cli.profile.is_some() {
        settings.template_profile = cli.profile.clone();
    }
    if cli.registry.is_some() {
        settings.registry = cli.registry.clone();
    }

    let registry_path = settings.registry_path().ok_or(CliError::NoRegistry)?;
    let registry = ProfessionalRegistry::load(&registry_path)?;

    if cli.list_professionals {
        for name in registry.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let laudo = cli.laudo.as_deref().ok_or(CliError::MissingArgument("laudo"))?;
    let template_path = cli
        .template
        .as_deref()
        .ok_or(CliError::MissingArgument("template"))?;
    let professional = cli
        .professional
        .as_deref()
        .ok_or(CliError::MissingArgument("professional"))?;

    let submission = read_submission(laudo, cli.pls.as_deref(), cli.alvara.as_deref())?;
    probe(&settings, submission.kinds())?;

    let profile = match &settings.template_profile {
        Some(path) => TemplateProfile::load(path)?,
        None => TemplateProfile::bundled()?,
    };
    let template = XlsmTemplate::load(template_path)?;

    let pipeline = build_pipeline(&settings, profile, registry, &template.sheet_names())?;
    let bytes = pipeline.run_to_artifact(submission, professional, &template)?;

    std::fs::write(&cli.output, &bytes).map_err(|source| CliError::WriteOutput {
        path: cli.output.clone(),
        source,
    })?;
    tracing::info!(path = %cli.output.display(), bytes = bytes.len(), "Output written");
    println!("RAE written to {}", cli.output.display());
    Ok(())
}

fn read_submission(
    laudo: &Path,
    pls: Option<&Path>,
    alvara: Option<&Path>,
) -> Result<Submission, CliError> {
    let inputs = [
        (DocumentKind::PrimaryReport, Some(laudo)),
        (DocumentKind::ProgressSchedule, pls),
        (DocumentKind::Permit, alvara),
    ];

    let mut documents = Vec::new();
    for (kind, path) in inputs {
        let Some(path) = path else { continue };
        let bytes = std::fs::read(path).map_err(|source| CliError::ReadInput {
            path: path.to_path_buf(),
            source,
        })?;
        documents.push(SourceDocument::new(kind, bytes));
    }
    Ok(Submission::from_documents(documents)?)
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_full_run() {
        let cli = Cli::try_parse_from([
            "raefill",
            "--laudo",
            "laudo.pdf",
            "--pls",
            "pls.pdf",
            "--template",
            "RAE.xlsm",
            "--professional",
            "Ana Lima",
        ])
        .unwrap();
        assert_eq!(cli.laudo, Some(PathBuf::from("laudo.pdf")));
        assert_eq!(cli.pls, Some(PathBuf::from("pls.pdf")));
        assert!(cli.alvara.is_none());
        assert_eq!(cli.output, PathBuf::from("RAE_FINAL.xlsm"));
    }

    #[test]
    fn laudo_is_required_for_a_run() {
        let err = Cli::try_parse_from(["raefill", "--template", "RAE.xlsm", "--professional", "X"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn listing_needs_no_documents() {
        let cli = Cli::try_parse_from(["raefill", "--list-professionals", "--registry", "r.toml"]).unwrap();
        assert!(cli.list_professionals);
        assert!(cli.laudo.is_none());
    }

    #[test]
    fn submission_reads_only_given_files() {
        let dir = tempfile::tempdir().unwrap();
        let laudo = dir.path().join("laudo.pdf");
        let alvara = dir.path().join("alvara.pdf");
        std::fs::write(&laudo, b"%PDF-1.4 laudo").unwrap();
        std::fs::write(&alvara, b"%PDF-1.4 alvara").unwrap();

        let submission = read_submission(&laudo, None, Some(&alvara)).unwrap();
        assert_eq!(submission.len(), 2);
        let presence = submission.presence();
        assert!(presence.has_permit);
        assert!(!presence.has_progress_schedule);
    }

    #[test]
    fn unreadable_input_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("sumiu.pdf");
        let err = read_submission(&missing, None, None).unwrap_err();
        assert!(matches!(err, CliError::ReadInput { .. }));
        assert!(err.user_message().contains("sumiu.pdf"));
    }
}
