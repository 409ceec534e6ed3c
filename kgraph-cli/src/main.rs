// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! kgraph CLI
//!
//! Runs reasoning, building and merging against a JSON graph snapshot.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use kgraph_builder::{
    BuildGraphCommand, CandidateQuery, EntityMergeService, GraphBuilder, MergeCommand,
    MergeOutcome, SimilarityScorer,
};
use kgraph_core::{EntityType, GraphSnapshot, InMemoryGraphStore, KgraphConfig, Rule};
use kgraph_reasoning::{
    InMemoryKnowledge, ReasoningService, RunFraudDetectionCommand, RunHealthcareCheckCommand,
    RunReasoningCommand, RunRiskPropagationCommand,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "kgraph")]
#[command(about = "Knowledge graph reasoning for finance and healthcare", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "KGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Graph snapshot (JSON) to load into the in-memory store
    #[arg(short, long, env = "KGRAPH_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Project to operate on
    #[arg(short, long, env = "KGRAPH_PROJECT", default_value = "default")]
    project: String,

    /// Medical knowledge dataset (JSON)
    #[arg(short, long, env = "KGRAPH_KNOWLEDGE")]
    knowledge: Option<PathBuf>,

    /// Emit log lines as JSON
    #[arg(long)]
    json_logs: bool,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fraud detectors
    Fraud {
        /// Detection types (comma separated); all when omitted
        #[arg(long, value_delimiter = ',')]
        types: Vec<String>,

        /// Entities to inspect; every enterprise and company when omitted
        #[arg(long, value_delimiter = ',')]
        targets: Vec<String>,
    },

    /// Propagate risk outward from an entity
    Propagate {
        /// Source entity ID
        source: String,

        /// Risk level at the source
        #[arg(long, default_value = "HIGH")]
        level: String,

        /// Hop bound
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Check drug pairs for interactions
    Drugs {
        /// Drug entity IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Rank diseases for a set of symptoms
    Symptoms {
        /// Symptom entity IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Check a patient's diagnosis compliance
    Compliance {
        /// Patient entity ID
        patient: String,

        /// Diagnosis entity ID
        diagnosis: String,
    },

    /// Evaluate rules from a JSON file
    Rules {
        /// File holding a JSON array of rules
        file: PathBuf,

        /// Entities whose neighborhoods form the context; whole project when omitted
        #[arg(long, value_delimiter = ',')]
        targets: Vec<String>,
    },

    /// List duplicate candidates
    Candidates {
        /// Restrict to one entity type
        #[arg(long = "type")]
        entity_type: Option<String>,

        /// Similarity threshold (defaults to configuration)
        #[arg(long)]
        threshold: Option<f64>,

        /// Maximum number of groups (defaults to configuration)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Merge source entities into a target
    Merge {
        /// Surviving entity ID
        target: String,

        /// Entities folded into the target
        #[arg(required = true)]
        sources: Vec<String>,

        /// keep_target, keep_newest or merge_all
        #[arg(long, default_value = "merge_all")]
        strategy: String,

        /// Write the resulting project snapshot here
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Build extracted entities and relations from a JSON file
    Build {
        /// File holding a build command (entities and relations)
        file: PathBuf,

        /// Write the resulting project snapshot here
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries results; logs go to stderr
    if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn save_snapshot(store: &InMemoryGraphStore, project: &str, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        store
            .snapshot(project)
            .save(path)
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
        tracing::info!("Snapshot written to {:?}", path);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = KgraphConfig::load(cli.config.clone()).context("Failed to load configuration")?;

    let store = Arc::new(match &cli.snapshot {
        Some(path) => InMemoryGraphStore::from_snapshot(
            GraphSnapshot::from_file(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?,
        ),
        None => {
            tracing::warn!("No snapshot given, starting from an empty graph");
            InMemoryGraphStore::new()
        }
    });

    let knowledge = match &cli.knowledge {
        Some(path) => InMemoryKnowledge::from_file(path)
            .with_context(|| format!("Failed to load knowledge {}", path.display()))?,
        None => InMemoryKnowledge::new(),
    };

    let project = cli.project.clone();
    let service = ReasoningService::new(store.clone(), Arc::new(knowledge), config.reasoning.clone());

    match cli.command {
        Commands::Fraud { types, targets } => {
            let results = service
                .run_fraud_detection(&RunFraudDetectionCommand {
                    project_id: project,
                    detection_types: types,
                    target_entity_ids: targets,
                })
                .await?;
            print_json(&results)?;
        }

        Commands::Propagate {
            source,
            level,
            max_depth,
        } => {
            let result = service
                .run_risk_propagation(&RunRiskPropagationCommand {
                    project_id: project,
                    source_entity_id: source,
                    risk_level: level,
                    max_depth,
                })
                .await?;
            print_json(&result)?;
        }

        Commands::Drugs { ids } => {
            let report = service
                .run_healthcare_check(&RunHealthcareCheckCommand {
                    project_id: project,
                    check_types: vec!["DRUG_INTERACTION".into()],
                    drug_ids: ids,
                    ..Default::default()
                })
                .await?;
            print_json(&report.drug_interactions)?;
        }

        Commands::Symptoms { ids } => {
            let report = service
                .run_healthcare_check(&RunHealthcareCheckCommand {
                    project_id: project,
                    check_types: vec!["SYMPTOM_MATCH".into()],
                    symptom_ids: ids,
                    ..Default::default()
                })
                .await?;
            print_json(&report.symptom_match)?;
        }

        Commands::Compliance { patient, diagnosis } => {
            let report = service
                .run_healthcare_check(&RunHealthcareCheckCommand {
                    project_id: project,
                    check_types: vec!["DIAGNOSIS_COMPLIANCE".into()],
                    patient_id: Some(patient),
                    diagnosis_id: Some(diagnosis),
                    ..Default::default()
                })
                .await?;
            print_json(&report.compliance)?;
        }

        Commands::Rules { file, targets } => {
            let rules: Vec<Rule> = read_json(&file)?;
            let results = service
                .run_rules(&RunReasoningCommand {
                    project_id: project,
                    rules,
                    target_entity_ids: targets,
                    ..Default::default()
                })
                .await?;
            print_json(&results)?;
        }

        Commands::Candidates {
            entity_type,
            threshold,
            limit,
        } => {
            let mut query = CandidateQuery::from_config(project, &config.merge);
            if let Some(raw) = entity_type {
                query = query.with_type(raw.parse::<EntityType>()?);
            }
            if let Some(threshold) = threshold {
                query.similarity_threshold = threshold;
            }
            if let Some(limit) = limit {
                query.limit = limit;
            }
            let merger = EntityMergeService::with_config(store.clone(), &config.merge);
            print_json(&merger.find_candidates(&query).await?)?;
        }

        Commands::Merge {
            target,
            sources,
            strategy,
            output,
        } => {
            let merger = EntityMergeService::with_config(store.clone(), &config.merge);
            let mut command = MergeCommand::new(&project, target, sources);
            command.merge_strategy = strategy;

            match merger.merge(&command).await {
                MergeOutcome::Failed(e) => bail!("Merge failed: {e}"),
                outcome => {
                    if outcome.is_partial() {
                        tracing::warn!("Merge finished with errors");
                    }
                    print_json(&outcome.report())?;
                    save_snapshot(&store, &project, output.as_deref())?;
                }
            }
        }

        Commands::Build { file, output } => {
            // Dedupe settings come from [builder] config and KGRAPH_* overrides
            let mut command = read_json::<BuildGraphCommand>(&file)?.with_config(&config.builder);
            if command.project_id.is_empty() {
                command.project_id = project.clone();
            }
            let builder = GraphBuilder::new(SimilarityScorer::new(config.merge.similarity_mode));
            let result = builder.build(&command, &*store).await;
            print_json(&result)?;
            if !result.success {
                bail!("Graph build failed: {}", result.errors.join("; "));
            }
            save_snapshot(&store, &command.project_id, output.as_deref())?;
        }
    }

    Ok(())
}
