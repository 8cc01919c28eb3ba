//! onnx-surgeon CLI - command line interface for editing ONNX graphs
//!
//! Every subcommand loads a model, applies one kind of edit (or a JSON edit
//! plan) and writes the result to a new file. Reports go to stdout as JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use onnx_surgeon::{tensor::Fill, EditPlan, Model, SurgeryConfig};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "onnx-surgeon")]
#[command(about = "Excise, prune and rewrite nodes and constants of ONNX models")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Re-parse the edited model with tract before writing it
    #[arg(long, global = true)]
    verify: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the graph's nodes, constants and boundary declarations
    Inspect {
        model: PathBuf,
        /// Print a JSON summary instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Remove a single-input, single-output node and rewire its consumers
    Excise {
        model: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Name of the node to remove
        #[arg(long)]
        node: String,
    },
    /// Keep only the nodes needed to compute a node and make it the graph output
    Prune {
        model: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        node: String,
    },
    /// Overwrite a constant with ones or zeros
    #[command(group(ArgGroup::new("fill").required(true).args(["ones", "zeros"])))]
    Fill {
        model: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        constant: String,
        #[arg(long)]
        ones: bool,
        #[arg(long)]
        zeros: bool,
    },
    /// Apply a JSON edit plan
    Apply {
        model: PathBuf,
        #[arg(long)]
        plan: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<Model> {
    Model::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn save(model: &Model, path: &Path, config: &SurgeryConfig) -> Result<()> {
    model
        .save(path, config)
        .with_context(|| format!("failed to save {}", path.display()))
}

fn report<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = SurgeryConfig::default().with_verify(cli.verify);
    match cli.command {
        Commands::Inspect { model, json } => {
            let model = load(&model)?;
            if json {
                report(&model.summary())?;
            } else {
                println!("{}", model.pretty_print());
            }
        }
        Commands::Excise {
            model,
            output,
            node,
        } => {
            let mut model = load(&model)?;
            let excision = model
                .graph_mut()
                .excise(&node)
                .with_context(|| format!("cannot excise `{node}`"))?;
            save(&model, &output, &config)?;
            report(&excision)?;
        }
        Commands::Prune {
            model,
            output,
            node,
        } => {
            let mut model = load(&model)?;
            let pruning = model
                .graph_mut()
                .prune_to_reachable_from(&node)
                .with_context(|| format!("cannot prune to `{node}`"))?;
            save(&model, &output, &config)?;
            report(&pruning)?;
        }
        Commands::Fill {
            model,
            output,
            constant,
            ones,
            zeros: _,
        } => {
            let fill = if ones { Fill::Ones } else { Fill::Zeros };
            let mut model = load(&model)?;
            let write = model
                .graph_mut()
                .fill_constant(&constant, fill)
                .with_context(|| format!("cannot fill `{constant}`"))?;
            save(&model, &output, &config)?;
            report(&write)?;
        }
        Commands::Apply {
            model,
            plan,
            output,
        } => {
            let plan = EditPlan::load(&plan)
                .with_context(|| format!("failed to read plan {}", plan.display()))?;
            let mut model = load(&model)?;
            let outcomes = plan.apply(&mut model)?;
            let config = plan.config.with_verify(plan.config.verify_on_save || cli.verify);
            save(&model, &output, &config)?;
            report(&outcomes)?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
