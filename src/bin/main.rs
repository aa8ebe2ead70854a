//! dynq CLI - serve dynamic queries or compile QuerySpecs to SQL
//!
//! Usage:
//!   dynq serve [--config <dynq.toml>] [--bind <addr>]
//!   dynq compile <spec.json> [--output <format>]
//!   dynq compile --system
//!
//! Examples:
//!   dynq serve --bind 0.0.0.0:6173
//!   dynq compile specs/churn.json --output verbose
//!   dynq compile --system

use clap::{Parser, Subcommand, ValueEnum};
use dynq::config::Settings;
use dynq::spec::{system, QuerySpec};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dynq")]
#[command(about = "dynq - dynamic queries: QuerySpec compiler and AI-assisted SQL generation")]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to $DYNQ_CONFIG, ./dynq.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Compile a QuerySpec to SQL
    Compile {
        /// Path to a QuerySpec JSON file
        #[arg(required_unless_present = "system", conflicts_with = "system")]
        file: Option<PathBuf>,

        /// Compile the built-in customers/addresses query
        #[arg(long)]
        system: bool,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        output: OutputFormat,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Output SQL only
    Sql,
    /// Output SQL with comments
    Verbose,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings.logging.level);

    match cli.command {
        Commands::Serve { bind } => cmd_serve(settings, bind),
        Commands::Compile {
            file,
            system,
            output,
        } => cmd_compile(&settings, file, system, output),
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, dynq::config::SettingsError> {
    match path {
        Some(path) => Settings::from_file(path),
        None => Settings::load(),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Logs go to stderr so `compile` output stays pipeable.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init();
}

fn cmd_serve(mut settings: Settings, bind: Option<String>) -> ExitCode {
    if let Some(bind) = bind {
        settings.server.bind = bind;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(dynq::web::serve(settings)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn cmd_compile(
    settings: &Settings,
    file: Option<PathBuf>,
    system: bool,
    output: OutputFormat,
) -> ExitCode {
    let (spec, source) = if system {
        (system::customers_with_addresses(), "built-in system query".to_string())
    } else {
        let Some(file) = file else {
            eprintln!("Error: a spec file or --system is required");
            return ExitCode::FAILURE;
        };
        match read_spec(&file) {
            Ok(spec) => (spec, file.display().to_string()),
            Err(e) => {
                eprintln!("Error reading spec '{}': {}", file.display(), e);
                return ExitCode::FAILURE;
            }
        }
    };

    let compiler = settings.compiler.compiler();
    match compiler.compile(&spec) {
        Ok(sql) => {
            match output {
                OutputFormat::Sql => {
                    println!("{}", sql);
                }
                OutputFormat::Verbose => {
                    println!("-- dynq compiled SQL");
                    println!("-- Source: {}", source);
                    println!("-- Derived table depth: {}", spec.depth());
                    println!();
                    println!("{}", sql);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Compilation error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn read_spec(path: &PathBuf) -> Result<QuerySpec, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
