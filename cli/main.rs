#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use molar::config::StudyConfig;
use molar::data::schema::{DERIVED_FIELDS, LOGICAL_SCHEMA};
use molar::pipeline;

#[derive(Args)]
pub struct RunArgs {
    /// Study configuration (.toml). Defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overrides the configured input extract
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Overrides the configured output directory
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct DeriveArgs {
    /// Delimited survey extract with a header row
    pub input: PathBuf,

    /// Where to write the derived columns
    #[arg(long, default_value = "derived.tsv")]
    pub output: PathBuf,

    /// Study configuration supplying the separator, allostatic variant and outcomes
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole study: derive, fit every model, write reports
    Run(RunArgs),
    /// Compute the derived variables only
    Derive(DeriveArgs),
    /// Write a configuration file holding every default
    InitConfig {
        #[arg(default_value = "study.toml")]
        path: PathBuf,
    },
    /// List the raw fields the pipeline recognises
    Schema,
}

#[derive(Parser)]
#[command(
    name = "molar",
    version,
    about = "Survey-weighted analysis of tooth loss, allostatic load and cancer history"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

fn load_config(path: Option<&PathBuf>) -> Result<StudyConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            log::info!("Reading configuration from '{}'", path.display());
            Ok(StudyConfig::load(path)?)
        }
        None => Ok(StudyConfig::default()),
    }
}

fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(args.config.as_ref())?;
    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(output) = args.output {
        config.output_dir = output;
    }

    let summary = pipeline::run(&config)?;
    println!(
        "Analysed {} respondents; {} derived columns ({} data-quality note(s)).",
        summary.respondents,
        summary.derived_columns,
        summary.notes.len()
    );
    println!("Fitted: {}", summary.fitted.join(", "));
    if !summary.skipped.is_empty() {
        println!("Skipped: {}", summary.skipped.join(", "));
    }
    println!("Model table: {}", summary.files.models.display());
    Ok(())
}

fn derive(args: DeriveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args.config.as_ref())?;
    let notes = pipeline::derive_only(&args.input, &args.output, &config)?;
    println!(
        "Derived columns written to {} ({} data-quality note(s)).",
        args.output.display(),
        notes.len()
    );
    Ok(())
}

fn init_config(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    StudyConfig::default().save(&path)?;
    println!("Default configuration written to {}", path.display());
    Ok(())
}

fn print_schema() {
    println!("{:<24} {:<26} {:<9} description", "field", "kind", "optional");
    for spec in LOGICAL_SCHEMA {
        println!(
            "{:<24} {:<26} {:<9} {}",
            spec.name,
            spec.kind.describe(),
            if spec.optional { "yes" } else { "no" },
            spec.domain
        );
    }
    println!();
    println!("Derived (never accepted as input): {}", DERIVED_FIELDS.join(", "));
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Cli { command } = Cli::parse();

    let result = match command {
        Some(Commands::Run(args)) => run(args),
        Some(Commands::Derive(args)) => derive(args),
        Some(Commands::InitConfig { path }) => init_config(path),
        Some(Commands::Schema) => {
            print_schema();
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
