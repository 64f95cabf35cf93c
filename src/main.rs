use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use phenotype::{FeatureRow, PhenotypeScore};
use seneca_core::constants::{
    BACKEND_ENV, BACKENDS_FILE_ENV, DEFAULT_ANTIBIOTIC_WINDOW_HOURS, DEFAULT_BACKENDS_FILE,
    REFERENCE_FILE_ENV, USER_ENV,
};
use seneca_core::{
    Connection, EncounterRequest, EnvSecretStore, NoComorbidityIndex, Pipeline, ReferenceData,
    RunConfig, YamlBackendConfig,
};

#[derive(Parser)]
#[command(name = "seneca")]
#[command(about = "Sepsis phenotype retrieval and scoring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score feature rows read from a JSON file
    Score {
        /// JSON array of objects with the feature columns and an optional `id`
        input: PathBuf,
    },
    /// Retrieve, assemble and score a cohort of encounters from a FHIR backend
    Cohort {
        /// JSON array of encounter requests
        encounters: PathBuf,
        /// Backend id (falls back to SENECA_BACKEND)
        #[arg(long)]
        backend: Option<String>,
        /// Backend configuration YAML (falls back to SENECA_BACKENDS_FILE, then backends.yaml)
        #[arg(long)]
        backends_file: Option<PathBuf>,
        /// Reference data YAML replacing the bundled one (falls back to SENECA_REFERENCE_FILE)
        #[arg(long)]
        reference_file: Option<PathBuf>,
        /// User that secret paths are scoped to (falls back to USER)
        #[arg(long)]
        user: Option<String>,
        /// Hours after admission within which antibiotic orders count as early
        #[arg(long, default_value_t = DEFAULT_ANTIBIOTIC_WINDOW_HOURS)]
        antibiotic_window_hours: f64,
    },
}

/// A feature row submitted for offline scoring.
#[derive(Debug, Deserialize)]
struct ScoreInput {
    #[serde(default)]
    id: Option<String>,
    #[serde(flatten)]
    features: FeatureRow,
}

#[derive(Debug, Serialize)]
struct ScoreOutput {
    id: Option<String>,
    #[serde(flatten)]
    features: FeatureRow,
    #[serde(flatten)]
    score: PhenotypeScore,
}

/// Main entry point for the Seneca CLI
///
/// Loads `.env`, installs the tracing subscriber, and dispatches to a subcommand. Results are
/// written to stdout as one JSON object per line; logs go to stderr.
///
/// # Environment Variables
/// - `SENECA_BACKEND`: backend id when `--backend` is not given
/// - `SENECA_BACKENDS_FILE`: backend configuration YAML when `--backends-file` is not given
/// - `SENECA_REFERENCE_FILE`: reference data YAML when `--reference-file` is not given
/// - `USER`: secret scope when `--user` is not given
/// - `SENECA_SECRET__<PATH>__<FIELD>`: backend credentials
/// - `RUST_LOG`: log filter (default `seneca=info`)
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("seneca=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score { input } => {
            let outputs = score_file(&input)?;
            write_json_lines(&outputs)?;
        }
        Commands::Cohort {
            encounters,
            backend,
            backends_file,
            reference_file,
            user,
            antibiotic_window_hours,
        } => {
            let run = resolve_run_config(backend, backends_file, reference_file, user)?;
            let requests: Vec<EncounterRequest> = read_json(&encounters)?;

            let reference = match run.reference_file() {
                Some(path) => ReferenceData::load(path)?,
                None => ReferenceData::bundled()?,
            };
            let backends = YamlBackendConfig::load(run.backends_file())?;
            let secrets = EnvSecretStore::new(run.user().clone());
            let connection = Connection::establish(&backends, run.backend().as_str(), &secrets)?;

            tracing::info!(
                "++ Running {} encounters against {}",
                requests.len(),
                run.backend()
            );

            let pipeline = Pipeline::new(&connection, &reference, &NoComorbidityIndex)
                .with_antibiotic_window(antibiotic_window_hours);
            let results = pipeline.run_cohort(&requests, chrono::Utc::now().date_naive());
            write_json_lines(&results)?;
        }
    }

    Ok(())
}

/// Resolve run configuration from CLI flags, falling back to the environment.
fn resolve_run_config(
    backend: Option<String>,
    backends_file: Option<PathBuf>,
    reference_file: Option<PathBuf>,
    user: Option<String>,
) -> anyhow::Result<RunConfig> {
    let backend = backend
        .or_else(|| std::env::var(BACKEND_ENV).ok())
        .with_context(|| format!("no backend given; pass --backend or set {BACKEND_ENV}"))?;
    let backends_file = backends_file
        .or_else(|| std::env::var_os(BACKENDS_FILE_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKENDS_FILE));
    let reference_file =
        reference_file.or_else(|| std::env::var_os(REFERENCE_FILE_ENV).map(PathBuf::from));
    let user = user
        .or_else(|| std::env::var(USER_ENV).ok())
        .with_context(|| format!("no user given; pass --user or set {USER_ENV}"))?;

    Ok(RunConfig::new(&backend, backends_file, reference_file, &user)?)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

fn score_file(path: &Path) -> anyhow::Result<Vec<ScoreOutput>> {
    let inputs: Vec<ScoreInput> = read_json(path)?;
    Ok(inputs
        .into_iter()
        .map(|input| ScoreOutput {
            score: phenotype::score(&input.features),
            id: input.id,
            features: input.features,
        })
        .collect())
}

fn write_json_lines<T: Serialize>(rows: &[T]) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use phenotype::{Feature, Phenotype};
    use tempfile::TempDir;

    #[test]
    fn scores_rows_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("rows.json");
        fs::write(
            &path,
            r#"[
                {"id": "enc-1", "age": 65, "sex": 0},
                {"id": "enc-2"},
                {"hr": 120, "lactate": null}
            ]"#,
        )
        .expect("write rows");

        let outputs = score_file(&path).expect("score");

        assert_eq!(outputs.len(), 3);
        assert_eq!(outputs[0].id.as_deref(), Some("enc-1"));
        assert_eq!(outputs[0].features.get(Feature::Age), Some(65.0));
        assert_eq!(outputs[0].score.phenotype, Phenotype::Gamma);
        assert_eq!(outputs[1].score.phenotype, Phenotype::Alpha);
        assert_eq!(outputs[1].score.observed_features, 0);
        assert_eq!(outputs[2].id, None);
        assert_eq!(outputs[2].features.get(Feature::Hr), Some(120.0));
    }

    #[test]
    fn unknown_feature_column_is_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("rows.json");
        fs::write(&path, r#"[{"id": "enc-1", "ferritin": 900}]"#).expect("write rows");

        assert!(score_file(&path).is_err());
    }

    #[test]
    fn explicit_flags_win_over_environment() {
        let run = resolve_run_config(
            Some("hapi_prod".into()),
            Some(PathBuf::from("conf/backends.yaml")),
            None,
            Some("alice".into()),
        )
        .expect("run config");

        assert_eq!(run.backend().as_str(), "hapi_prod");
        assert_eq!(run.backends_file(), Path::new("conf/backends.yaml"));
        assert_eq!(run.user().as_str(), "alice");
    }
}
