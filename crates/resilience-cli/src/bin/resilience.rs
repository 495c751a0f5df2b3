//! Resilience CLI - drives the scenario resilience assessment pipeline
//!
//! Usage:
//!   resilience check [--network FILE]
//!   resilience parameterize --priors P.csv --elicitation E.csv --experts W.csv -o network.json
//!   resilience infer --artifact network.json [--evidence E.json | --facts F.json --stage t2]
//!   resilience trajectory --artifact network.json --facts F.json

use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use resilience_core::engine::evidence::{CaseFacts, Evidence, TimeStage};
use resilience_core::engine::trajectory::assess_stages;
use resilience_core::pipeline::{parameterize, AssessmentInputs};
use resilience_core::scenario::SCENARIO_RESILIENCE_SOURCE;
use resilience_core::storage::tables::{load_elicitation_table, load_expert_panel, load_prior_table};
use resilience_core::storage::{
    load_network, save_network, write_cpt_report, write_posterior_report, EvidenceAuditLog,
};
use resilience_core::{
    load_network_spec, Diagnostics, InferenceCoordinator, NetworkSpec, PosteriorReport,
    ResilienceConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resilience")]
#[command(version)]
#[command(about = "Scenario resilience assessment with fuzzy expert elicitation and Bayesian networks")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, value_name = "FILE", env = "RESILIENCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse and validate a network definition
    Check {
        /// Network definition (defaults to the built-in scenario network)
        #[arg(short, long, value_name = "FILE")]
        network: Option<PathBuf>,
    },
    /// Estimate priors, aggregate expert grades and save the parameterized network
    Parameterize {
        #[arg(short, long, value_name = "FILE")]
        network: Option<PathBuf>,
        /// Historical prior table (CSV)
        #[arg(long, value_name = "FILE")]
        priors: PathBuf,
        /// Expert elicitation table (CSV)
        #[arg(long, value_name = "FILE")]
        elicitation: PathBuf,
        /// Expert weighting table (CSV)
        #[arg(long, value_name = "FILE")]
        experts: PathBuf,
        /// Output artifact (JSON)
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
        /// Also write a readable CPT dump
        #[arg(long, value_name = "FILE")]
        cpt_report: Option<PathBuf>,
    },
    /// Compute posteriors under evidence
    Infer {
        #[arg(short, long, value_name = "FILE")]
        artifact: PathBuf,
        /// Evidence map (JSON object node -> state index)
        #[arg(long, value_name = "FILE", conflicts_with = "facts")]
        evidence: Option<PathBuf>,
        /// Case facts (JSON) mapped to evidence at --stage
        #[arg(long, value_name = "FILE")]
        facts: Option<PathBuf>,
        #[arg(long, default_value = "t3", value_name = "STAGE")]
        stage: String,
        /// Append applied evidence to this audit log
        #[arg(long, value_name = "FILE")]
        audit_log: Option<PathBuf>,
        /// Write the posterior report (JSON)
        #[arg(short, long, value_name = "FILE")]
        report: Option<PathBuf>,
        /// Output format: summary or json
        #[arg(short, long, default_value = "summary", value_name = "FORMAT")]
        output: String,
    },
    /// Assess resilience across stages T0..T3
    Trajectory {
        #[arg(short, long, value_name = "FILE")]
        artifact: PathBuf,
        #[arg(long, value_name = "FILE")]
        facts: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ResilienceConfig::load(path).unwrap_or_else(|e| fail("Config error", e)),
        None => ResilienceConfig::default(),
    };

    match cli.command {
        Command::Check { network } => {
            let spec = read_spec(network.as_deref());
            println!("✓ Network '{}' validated successfully", spec.name);
            for node in &spec.nodes {
                if node.parents.is_empty() {
                    println!("  {} [{}]", node.name, node.states.join(", "));
                } else {
                    println!(
                        "  {} [{}] <- ({})",
                        node.name,
                        node.states.join(", "),
                        node.parents.join(", ")
                    );
                }
            }
        }
        Command::Parameterize {
            network,
            priors,
            elicitation,
            experts,
            output,
            cpt_report,
        } => {
            let spec = read_spec(network.as_deref());
            let inputs = AssessmentInputs {
                prior_table: load_prior_table(&priors).unwrap_or_else(|e| fail("Prior table", e)),
                panel: load_expert_panel(&experts).unwrap_or_else(|e| fail("Expert table", e)),
                items: load_elicitation_table(&elicitation)
                    .unwrap_or_else(|e| fail("Elicitation table", e)),
            };
            let net = parameterize(spec, &inputs, &config)
                .unwrap_or_else(|e| fail("Parameterization failed", e));
            save_network(&net, &output).unwrap_or_else(|e| fail("Save failed", e));
            if let Some(path) = cpt_report {
                write_cpt_report(net.network(), &path)
                    .unwrap_or_else(|e| fail("CPT report failed", e));
            }
            println!(
                "✓ Saved {} nodes to '{}'",
                net.network().len(),
                output.display()
            );
            print_diagnostics(net.diagnostics());
        }
        Command::Infer {
            artifact,
            evidence,
            facts,
            stage,
            audit_log,
            report,
            output,
        } => {
            let net = load_network(&artifact, config.row_tolerance)
                .unwrap_or_else(|e| fail("Load failed", e));
            let evidence = match (evidence, facts) {
                (Some(path), _) => read_json::<Evidence>(&path),
                (None, Some(path)) => {
                    let stage: TimeStage = stage.parse().unwrap_or_else(|e| fail("Stage", e));
                    let mapper = config.mapper().unwrap_or_else(|e| fail("Config error", e));
                    mapper.map(&read_json::<CaseFacts>(&path), stage)
                }
                (None, None) => Evidence::new(),
            };

            let mut coordinator = InferenceCoordinator::new(net);
            if let Some(path) = audit_log {
                coordinator = coordinator.with_evidence_sink(EvidenceAuditLog::new(path));
            }
            coordinator
                .set_evidence(evidence)
                .unwrap_or_else(|e| fail("Inference failed", e));
            let posterior = coordinator
                .posterior_report()
                .unwrap_or_else(|e| fail("Inference failed", e));

            if let Some(path) = report {
                write_posterior_report(&posterior, &path)
                    .unwrap_or_else(|e| fail("Report failed", e));
            }
            match output.as_str() {
                "json" => match serde_json::to_string_pretty(&posterior) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error serializing to JSON: {}", e);
                        process::exit(1);
                    }
                },
                _ => print_posteriors(&posterior),
            }
            print_diagnostics(coordinator.diagnostics());
        }
        Command::Trajectory { artifact, facts } => {
            let net = load_network(&artifact, config.row_tolerance)
                .unwrap_or_else(|e| fail("Load failed", e));
            let facts = read_json::<CaseFacts>(&facts);
            let mapper = config.mapper().unwrap_or_else(|e| fail("Config error", e));
            let chain = config
                .trajectory
                .stage_chain()
                .unwrap_or_else(|e| fail("Config error", e));

            let mut coordinator = InferenceCoordinator::new(net);
            let stages = assess_stages(
                &mut coordinator,
                &mapper,
                &facts,
                &chain,
                &config.trajectory.weights(),
                config.trajectory.temperature,
            )
            .unwrap_or_else(|e| fail("Trajectory failed", e));

            println!("{:<6} {:>12} {:>12}", "stage", "P(Good)", "filtered");
            for stage in &stages {
                let good = stage
                    .report
                    .nodes
                    .get("ScenarioResilience")
                    .and_then(|states| states.iter().find(|s| s.state == "Good"))
                    .map(|s| s.probability)
                    .unwrap_or(f64::NAN);
                println!(
                    "{:<6} {:>12.6} {:>12.6}",
                    stage.stage.label(),
                    good,
                    stage.filtered[0]
                );
            }
            print_diagnostics(coordinator.diagnostics());
        }
    }
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, err);
    process::exit(1);
}

fn read_spec(path: Option<&Path>) -> NetworkSpec {
    let source = match path {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            fail(&format!("Error reading file '{}'", path.display()), e)
        }),
        None => SCENARIO_RESILIENCE_SOURCE.to_string(),
    };
    load_network_spec(&source).unwrap_or_else(|e| fail("Parse/validation error", e))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let text = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(&format!("Error reading file '{}'", path.display()), e));
    serde_json::from_str(&text)
        .unwrap_or_else(|e| fail(&format!("Invalid JSON in '{}'", path.display()), e))
}

fn print_posteriors(report: &PosteriorReport) {
    println!("Posteriors for '{}':", report.network);
    if !report.evidence.is_empty() {
        println!("Evidence:");
        for (node, state) in &report.evidence {
            println!("  {} = {}", node, state);
        }
    }
    for (node, states) in &report.nodes {
        let probs = states
            .iter()
            .map(|s| format!("{}={:.4}", s.state, s.probability))
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {:<22} {}", node, probs);
    }
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        println!("\nNo diagnostics; results can be trusted.");
        return;
    }
    println!("\nDiagnostics ({}):", diagnostics.len());
    for diagnostic in diagnostics {
        println!("  - {}", diagnostic);
    }
}
