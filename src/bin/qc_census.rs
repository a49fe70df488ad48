use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use qc_census::app::{AnnotateInputs, App, AvailableInputs, MergeInputs};
use qc_census::config::{ConfigLoader, ConfigOverrides};
use qc_census::domain::DateMode;
use qc_census::error::CensusError;
use qc_census::output::{JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "qc-census")]
#[command(about = "Reconcile sequence archive records with finished QC results and roll read summaries up the run/experiment/sample hierarchy")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Config file path (defaults to qc-census.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Worker pool width for every fan-out stage
    #[arg(long, global = true)]
    parallels: Option<usize>,

    #[arg(long, global = true, value_enum)]
    date_mode: Option<DateMode>,

    /// Base date for the availability predicate (defaults to now)
    #[arg(long, global = true)]
    base_date: Option<String>,

    /// Replace existing outputs, keeping a dated backup
    #[arg(long, global = true)]
    overwrite: bool,

    #[arg(long, global = true)]
    outdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List archive records that still need a QC pass")]
    Available(AvailableArgs),
    #[command(about = "Merge per-read summaries into run, experiment, and sample tables")]
    Merge(MergeArgs),
    #[command(about = "Annotate merged tables with taxonomy, library, and date metadata")]
    Annotate(AnnotateArgs),
    #[command(about = "List finished results produced by a different FastQC version")]
    Outdated(OutdatedArgs),
}

#[derive(Args)]
struct AvailableArgs {
    /// SRA_Accessions reference table
    #[arg(long)]
    accessions: PathBuf,

    /// Experiment id to read layout table
    #[arg(long)]
    layouts: Option<PathBuf>,

    /// Root of the FastQC results tree
    #[arg(long)]
    fastqc_dir: PathBuf,
}

#[derive(Args)]
struct MergeArgs {
    /// TSV listing per-read summary file paths, one per line
    #[arg(long)]
    summary_list: PathBuf,

    /// SRA_Run_Members reference table
    #[arg(long)]
    run_members: PathBuf,
}

#[derive(Args)]
struct AnnotateArgs {
    /// Merged experiment-level table
    #[arg(long)]
    experiments: PathBuf,

    /// Merged sample-level table
    #[arg(long)]
    samples: PathBuf,

    /// SRA_Run_Members reference table
    #[arg(long)]
    run_members: PathBuf,

    /// Biosample taxonomy table (accession, taxonomy id, name, genome size)
    #[arg(long)]
    taxonomy: PathBuf,

    /// Experiment library table (experiment, instrument, strategy, source, selection)
    #[arg(long)]
    library: PathBuf,

    /// SRA_Accessions reference table (received dates)
    #[arg(long)]
    accessions: PathBuf,
}

#[derive(Args)]
struct OutdatedArgs {
    /// Root of the FastQC results tree
    #[arg(long)]
    fastqc_dir: PathBuf,

    /// FastQC version the results are expected to carry
    #[arg(long)]
    version: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(census) = report.downcast_ref::<CensusError>() {
            return ExitCode::from(map_exit_code(census));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &CensusError) -> u8 {
    match error {
        CensusError::MissingInput(_) | CensusError::ConfigRead(_) => 2,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Plain
    };

    let overrides = ConfigOverrides {
        parallels: cli.parallels,
        date_mode: cli.date_mode,
        base_date: cli.base_date.clone(),
        overwrite: cli.overwrite.then_some(true),
        outdir: cli.outdir.clone(),
    };
    let config = ConfigLoader::resolve(cli.config.as_deref(), overrides).into_diagnostic()?;
    let app = App::new(config);

    match cli.command {
        Commands::Available(args) => {
            let result = app
                .available(&AvailableInputs {
                    accessions: args.accessions,
                    layouts: args.layouts,
                    fastqc_dir: args.fastqc_dir,
                })
                .into_diagnostic()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_available(&result).into_diagnostic()?,
                OutputMode::Plain => {
                    println!(
                        "finished: {}  live: {}  available: {}",
                        result.finished, result.live, result.available
                    );
                    print_outputs(&result.outputs);
                }
            }
        }
        Commands::Merge(args) => {
            let result = app
                .merge(&MergeInputs {
                    summary_list: args.summary_list,
                    run_members: args.run_members,
                })
                .into_diagnostic()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_merge(&result).into_diagnostic()?,
                OutputMode::Plain => {
                    println!(
                        "reads: {} ({} unreadable)  runs: {} ({} imperfect)  experiments: {}  samples: {}",
                        result.reads,
                        result.unreadable_reads,
                        result.runs,
                        result.imperfect_runs,
                        result.experiments,
                        result.samples
                    );
                    print_outputs(&result.outputs);
                }
            }
        }
        Commands::Annotate(args) => {
            let result = app
                .annotate(&AnnotateInputs {
                    experiments: args.experiments,
                    samples: args.samples,
                    run_members: args.run_members,
                    taxonomy: args.taxonomy,
                    library: args.library,
                    accessions: args.accessions,
                })
                .into_diagnostic()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_annotate(&result).into_diagnostic()?,
                OutputMode::Plain => {
                    println!(
                        "experiments annotated: {}  samples annotated: {}",
                        result.experiments, result.samples
                    );
                    print_outputs(&result.outputs);
                }
            }
        }
        Commands::Outdated(args) => {
            let result = app
                .outdated(&args.fastqc_dir, &args.version)
                .into_diagnostic()?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_outdated(&result).into_diagnostic()?,
                OutputMode::Plain => {
                    println!(
                        "finished: {}  outdated: {}",
                        result.finished, result.outdated
                    );
                    print_outputs(&result.outputs);
                }
            }
        }
    }

    Ok(())
}

fn print_outputs(outputs: &[qc_census::app::WriteOutcome]) {
    for outcome in outputs {
        println!("  {} {} ({} records)", outcome.action, outcome.path, outcome.records);
    }
}
