//! ClickHouse Operator
//!
//! Command line front end of the manifest compiler. Reads a
//! ClickHouseInstallation from a YAML file, compiles it and prints the
//! generated objects to stdout. Logs go to stderr.

use clap::{Parser, Subcommand, ValueEnum};
use kube::CustomResourceExt;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use clickhouse_operator::{normalize, ClickHouseInstallation, Compiler, CompilerConfig, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// ClickHouse Operator - compile ClickHouseInstallation resources to Kubernetes manifests
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile an installation into Services, ConfigMaps and StatefulSets
    Compile {
        /// Installation manifest, `-` for stdin
        #[arg(short, long, default_value = "-")]
        file: String,

        /// Compiler configuration file
        #[arg(short, long, env = "CHOP_CONFIG")]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,

        /// Compile the installation as given, without normalizing it
        #[arg(long)]
        no_normalize: bool,
    },

    /// Print the ClickHouseInstallation CustomResourceDefinition
    Crd,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Yaml,
    Json,
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    match args.command {
        Command::Compile {
            file,
            config,
            format,
            no_normalize,
        } => run_compile(&file, config, format, no_normalize),
        Command::Crd => {
            print!("{}", serde_yaml::to_string(&ClickHouseInstallation::crd())?);
            Ok(())
        }
    }
}

fn run_compile(
    file: &str,
    config: Option<PathBuf>,
    format: OutputFormat,
    no_normalize: bool,
) -> Result<()> {
    let config = match config {
        Some(path) => CompilerConfig::from_file(&path)?,
        None => CompilerConfig::default(),
    };

    let chi: ClickHouseInstallation = serde_yaml::from_str(&read_input(file)?)?;
    info!(
        "Compiling installation {} (version {})",
        chi.metadata.name.as_deref().unwrap_or_default(),
        clickhouse_operator::VERSION
    );

    let chi = if no_normalize {
        chi
    } else {
        normalize(&chi, &config.default_namespace)?
    };

    let compiler = Compiler::new(config)?;
    let generated = compiler.compile(&chi)?;

    let output = match format {
        OutputFormat::Yaml => generated.to_yaml()?,
        OutputFormat::Json => generated.to_json()?,
    };
    println!("{}", output.trim_end());
    Ok(())
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(std::fs::read_to_string(file)?)
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    if let Ok(directive) = "kube=warn".parse() {
        filter = filter.add_directive(directive);
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
