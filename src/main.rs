use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use ods_classifier::{
    server, ClassificationService, FileModelStore, Label, RetrainOutcome, ServerConfig, TrainingConfig,
    TrainingPipeline,
};

#[derive(Parser, Debug)]
#[command(name = "ods-classifier", version, about = "Train and query a TF-IDF text classifier")]
struct Cli {
    /// Directory holding the current model (defaults to $ODS_CLASSIFIER_HOME/models or the user data dir)
    #[arg(long, global = true)]
    models_dir: Option<PathBuf>,

    /// JSON file with training settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Label texts with the current model
    Predict {
        /// Texts to classify
        texts: Vec<String>,

        /// Read texts from a file, one per paragraph
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Fit a new model from a JSON dataset and make it current
    Retrain {
        /// Dataset file with `texts` and `labels` arrays, or `-` for stdin
        #[arg(long)]
        data: String,
    },
    /// Report whether a model can be loaded
    Health,
    /// Serve the HTTP API
    Serve {
        /// Address to bind
        #[arg(long)]
        addr: Option<String>,

        /// Origin allowed to call the API; repeat for several. Replaces the defaults.
        #[arg(long = "allow-origin")]
        allow_origins: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
struct Dataset {
    #[serde(alias = "textos")]
    texts: Vec<String>,
    labels: Vec<Label>,
}

/// Splits text into paragraphs at blank lines and `---` separator lines.
fn split_paragraphs(text: &str) -> Result<Vec<String>> {
    let separator = Regex::new(r"^\s*(-{3,})?\s*$").context("invalid separator pattern")?;
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if separator.is_match(line) {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    Ok(paragraphs)
}

fn read_dataset(source: &str) -> Result<Dataset> {
    let raw = if source == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer).context("failed to read dataset from stdin")?;
        buffer
    } else {
        fs::read_to_string(source).with_context(|| format!("failed to read dataset {}", source))?
    };
    serde_json::from_str(&raw).context("dataset must be JSON with `texts` and `labels` arrays")
}

fn open_store(models_dir: Option<&Path>) -> Result<FileModelStore> {
    let store = match models_dir {
        Some(dir) => FileModelStore::new(dir),
        None => FileModelStore::new_default(),
    };
    store.context("failed to open models directory")
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let training = match &cli.config {
        Some(path) => TrainingConfig::from_file(path)?,
        None => TrainingConfig::default(),
    };
    let pipeline = TrainingPipeline::new(training)?;
    let store = open_store(cli.models_dir.as_deref())?;
    info!("Using models directory {:?}", store.models_dir());
    let service = ClassificationService::with_pipeline(store, pipeline);

    match cli.command {
        Commands::Predict { mut texts, file } => {
            if let Some(path) = file {
                let content = fs::read_to_string(&path).with_context(|| format!("failed to read {:?}", path))?;
                texts.extend(split_paragraphs(&content)?);
            }
            if texts.is_empty() {
                bail!("nothing to classify: pass texts or --file");
            }
            let predictions = service.predict(&texts)?;
            let rows: Vec<_> = texts
                .iter()
                .zip(&predictions)
                .map(|(text, p)| json!({ "text": text, "label": p.label, "probability": p.probability }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Retrain { data } => {
            let dataset = read_dataset(&data)?;
            match service.retrain(&dataset.texts, &dataset.labels)? {
                RetrainOutcome::Trained(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                RetrainOutcome::InsufficientExamples { received } => {
                    bail!("insufficient examples: need at least 2, got {}", received)
                }
            }
        }
        Commands::Health => {
            let health = service.health();
            println!("{}", serde_json::to_string_pretty(&health)?);
            if !health.model_loaded {
                std::process::exit(1);
            }
        }
        Commands::Serve { addr, allow_origins } => {
            let mut config = ServerConfig::default();
            if let Some(addr) = addr {
                config.addr = addr;
            }
            if !allow_origins.is_empty() {
                config.allowed_origins = allow_origins;
            }
            server::serve(&service, &config).context("server stopped")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_paragraphs() {
        let text = "first line\ncontinued\n\n  \nsecond\n---\nthird\n -----  \n";
        let paragraphs = split_paragraphs(text).unwrap();
        assert_eq!(paragraphs, vec!["first line\ncontinued", "second", "third"]);
    }

    #[test]
    fn test_split_paragraphs_empty() {
        assert!(split_paragraphs("\n\n---\n").unwrap().is_empty());
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["ods-classifier", "predict", "hello", "--models-dir", "/tmp/m"]).unwrap();
        assert_eq!(cli.models_dir, Some(PathBuf::from("/tmp/m")));
        assert!(matches!(cli.command, Commands::Predict { ref texts, .. } if texts == &["hello".to_string()]));
    }
}
