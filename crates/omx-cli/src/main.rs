use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use omx_core::{
    ExperimentConfig, ModelRegistry, ObservationTypeRegistry, OmxError, VariantRegistry,
};
use omx_exp::reference::ReferenceEngine;
use omx_exp::registry::{FnTask, TaskRegistry};
use omx_exp::runner::Harness;
use omx_exp::{fixtures, obs_types, report, sweeps, validation, variants};

#[derive(Parser, Debug)]
#[command(name = "omx", about = "Observation matcher experiment harness CLI")]
struct Cli {
    /// Base configuration file.
    #[arg(long, default_value = "res/config.yaml")]
    config: PathBuf,
    /// YAML model registry overriding the bundled demo models.
    #[arg(long)]
    models: Option<PathBuf>,
    /// Resource directory holding the bundled demo models.
    #[arg(long, default_value = "res")]
    res: PathBuf,
    /// Experiment data folder receiving logs and reports.
    #[arg(long, default_value = "logs")]
    folder: PathBuf,
    /// Master seed override for this invocation.
    #[arg(long)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available experiments and plot tasks.
    List,
    /// Run experiments by name (default: all).
    Run {
        /// Experiment names to run.
        names: Vec<String>,
    },
    /// Create report tables by name (default: all).
    Plot {
        /// Plot task names to run.
        names: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), OmxError> {
    let mut base_config = ExperimentConfig::load(&cli.config)?;
    if let Some(seed) = cli.seed {
        base_config.run.master_seed = seed;
    }

    let engine = ReferenceEngine;
    let models = match &cli.models {
        Some(path) => ModelRegistry::from_file(path)?,
        None => ModelRegistry::bundled(&cli.res),
    };
    let variant_registry = VariantRegistry::standard();
    let observation_registry = ObservationTypeRegistry::standard();

    let harness = Harness::new(
        &engine,
        &models,
        &variant_registry,
        &observation_registry,
        base_config,
        cli.folder.join("temp"),
        cli.folder.clone(),
    );
    let plots_root = cli.folder.join("plots");

    let mut experiments = TaskRegistry::new();
    experiments.register(Box::new(FnTask::new(
        "exp.helper.exp2_observations",
        "Generates the fixed observation datasets for the matcher comparison",
        || {
            let set = fixtures::generate(&harness)?;
            fixtures::save(&harness, &set).map(|_| ())
        },
    )));
    experiments.register(Box::new(FnTask::new(
        "exp.systematic.pos_and_neg_obs",
        "Checks correctness of classification for positive and negative observations",
        || validation::run(&harness).map(|_| ()),
    )));
    experiments.register(Box::new(FnTask::new(
        "exp.systematic.matcher_types",
        "Compares matching run times for different matcher types",
        || variants::run(&harness).map(|_| ()),
    )));
    experiments.register(Box::new(FnTask::new(
        "exp.systematic.obs_types",
        "Compares matching run times for different observation types",
        || obs_types::run(&harness).map(|_| ()),
    )));
    experiments.register(Box::new(FnTask::new(
        "exp.systematic.obs_sizes",
        "Compares matching run times for different observation sizes",
        || sweeps::observation_sizes(&harness).map(|_| ()),
    )));
    experiments.register(Box::new(FnTask::new(
        "exp.systematic.obs_extents",
        "Compares matching run times for different observation extents",
        || sweeps::observation_extents(&harness).map(|_| ()),
    )));

    let store = harness.store.clone();
    let mut plots = TaskRegistry::new();
    plots.register(Box::new(FnTask::new(
        "plot.pos_and_neg_obs",
        "Creates the CSV file for positive and negative runs",
        {
            let store = store.clone();
            let plots_root = plots_root.clone();
            move || report::write_validation_report(&store, &plots_root).map(|_| ())
        },
    )));
    plots.register(Box::new(FnTask::new(
        "plot.matcher_types",
        "Creates the LaTeX table for performance comparison of different matcher types",
        {
            let store = store.clone();
            let plots_root = plots_root.clone();
            move || report::write_variant_report(&store, &plots_root).map(|_| ())
        },
    )));
    plots.register(Box::new(FnTask::new(
        "plot.obs_types",
        "Creates the LaTeX table for performance comparison of different observation types",
        {
            let store = store.clone();
            let plots_root = plots_root.clone();
            move || report::write_obs_type_report(&store, &plots_root).map(|_| ())
        },
    )));
    plots.register(Box::new(FnTask::new(
        "plot.obs_sizes_and_extents",
        "Creates the data tables for observation size and extent sweeps",
        {
            let store = store.clone();
            let plots_root = plots_root.clone();
            move || report::write_sweep_reports(&store, &plots_root).map(|_| ())
        },
    )));

    match cli.command {
        Command::List => {
            print_listing("Available Experiments", &experiments);
            println!();
            print_listing("Available Plots", &plots);
            Ok(())
        }
        Command::Run { names } => experiments.run_named(&names),
        Command::Plot { names } => plots.run_named(&names),
    }
}

fn print_listing(title: &str, registry: &TaskRegistry<'_>) {
    println!("--| {title} |----------------------------");
    let entries = registry.descriptions();
    let width = entries
        .iter()
        .map(|(name, _)| name.len() + 1)
        .max()
        .unwrap_or(0);
    for (name, description) in entries {
        let label = format!("{name}:");
        println!("{label:<width$} {description}");
    }
}
